//! HTTP `Range` header parsing and resolution against a known object size.
//!
//! Only single byte ranges are supported. Multipart range requests are a hard
//! error (the caller answers 416); any other malformed header is ignored and
//! the full body is served.

/// A parsed `Range` header, before the object size is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=N-` or `bytes=N-M` (length = M - N + 1).
    Offset { start: u64, length: Option<u64> },
    /// `bytes=-N`: the last N bytes of the object.
    Suffix { length: u64 },
}

/// Multipart (comma-separated) range requests are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartUnsupported;

/// A range resolved against the object's total size.
/// Invariant: `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ResolvedRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// The requested range cannot be satisfied for this object size.
/// Callers respond 416 with `Content-Range: bytes */{total}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsatisfiable;

/// Parse an HTTP `Range` header value.
///
/// Returns `Ok(None)` when the header is absent, does not use the `bytes`
/// unit, or is malformed; all of these mean "serve the full body".
pub fn parse(header: Option<&str>) -> Result<Option<RangeSpec>, MultipartUnsupported> {
    let header = match header {
        Some(h) => h,
        None => return Ok(None),
    };

    let spec = match header.strip_prefix("bytes=") {
        Some(rest) => rest.trim(),
        None => return Ok(None),
    };

    if spec.contains(',') {
        return Err(MultipartUnsupported);
    }

    let (start_str, end_str) = match spec.split_once('-') {
        Some(parts) => parts,
        None => return Ok(None),
    };

    // Suffix: bytes=-500
    if start_str.is_empty() {
        return Ok(match end_str.parse::<u64>() {
            Ok(n) if n > 0 => Some(RangeSpec::Suffix { length: n }),
            _ => None,
        });
    }

    // bytes=500- or bytes=500-999
    let start = match start_str.parse::<u64>() {
        Ok(n) => n,
        Err(_) => return Ok(None),
    };

    if end_str.is_empty() {
        return Ok(Some(RangeSpec::Offset {
            start,
            length: None,
        }));
    }

    Ok(match end_str.parse::<u64>() {
        Ok(end) if end >= start => Some(RangeSpec::Offset {
            start,
            length: Some(end - start + 1),
        }),
        _ => None,
    })
}

/// Resolve a parsed range against the object's total size.
pub fn resolve(total: u64, spec: &RangeSpec) -> Result<ResolvedRange, Unsatisfiable> {
    if total == 0 {
        return Err(Unsatisfiable);
    }

    let (start, end) = match *spec {
        RangeSpec::Suffix { length } => {
            let len = length.min(total);
            (total - len, total - 1)
        }
        RangeSpec::Offset { start, length } => {
            let end = match length {
                Some(len) => (total - 1).min(start.saturating_add(len) - 1),
                None => total - 1,
            };
            (start, end)
        }
    };

    if start >= total || end < start {
        return Err(Unsatisfiable);
    }

    Ok(ResolvedRange { start, end, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_foreign_units_serve_full_body() {
        assert_eq!(parse(None), Ok(None));
        assert_eq!(parse(Some("items=0-10")), Ok(None));
        assert_eq!(parse(Some("garbage")), Ok(None));
    }

    #[test]
    fn test_parse_bounded_range() {
        assert_eq!(
            parse(Some("bytes=0-99")),
            Ok(Some(RangeSpec::Offset {
                start: 0,
                length: Some(100)
            }))
        );
    }

    #[test]
    fn test_parse_open_ended_range() {
        assert_eq!(
            parse(Some("bytes=500-")),
            Ok(Some(RangeSpec::Offset {
                start: 500,
                length: None
            }))
        );
    }

    #[test]
    fn test_parse_suffix_range() {
        assert_eq!(
            parse(Some("bytes=-500")),
            Ok(Some(RangeSpec::Suffix { length: 500 }))
        );
        // Zero-length suffix is meaningless, treat as no range.
        assert_eq!(parse(Some("bytes=-0")), Ok(None));
        assert_eq!(parse(Some("bytes=-abc")), Ok(None));
    }

    #[test]
    fn test_parse_malformed_specs() {
        assert_eq!(parse(Some("bytes=abc-10")), Ok(None));
        assert_eq!(parse(Some("bytes=10-5")), Ok(None));
        assert_eq!(parse(Some("bytes=")), Ok(None));
        assert_eq!(parse(Some("bytes=-")), Ok(None));
    }

    #[test]
    fn test_multipart_rejected() {
        assert_eq!(parse(Some("bytes=0-10,20-30")), Err(MultipartUnsupported));
    }

    #[test]
    fn test_resolve_bounded() {
        let spec = RangeSpec::Offset {
            start: 0,
            length: Some(100),
        };
        let r = resolve(1000, &spec).unwrap();
        assert_eq!((r.start, r.end), (0, 99));
        assert_eq!(r.len(), 100);
        assert_eq!(r.content_range(), "bytes 0-99/1000");
    }

    #[test]
    fn test_resolve_open_ended() {
        let spec = RangeSpec::Offset {
            start: 500,
            length: None,
        };
        let r = resolve(1000, &spec).unwrap();
        assert_eq!((r.start, r.end), (500, 999));
    }

    #[test]
    fn test_resolve_suffix() {
        let r = resolve(1000, &RangeSpec::Suffix { length: 500 }).unwrap();
        assert_eq!((r.start, r.end), (500, 999));

        // Suffix larger than the object covers the whole object.
        let r = resolve(1000, &RangeSpec::Suffix { length: 5000 }).unwrap();
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn test_resolve_end_clamped_to_total() {
        let spec = RangeSpec::Offset {
            start: 900,
            length: Some(500),
        };
        let r = resolve(1000, &spec).unwrap();
        assert_eq!((r.start, r.end), (900, 999));
    }

    #[test]
    fn test_resolve_start_past_end_of_object() {
        let spec = RangeSpec::Offset {
            start: 1500,
            length: None,
        };
        assert_eq!(resolve(1000, &spec), Err(Unsatisfiable));
    }
}
