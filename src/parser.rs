// Slice-based frame boundary scanner for byte-stream transports.

fn parse_content_length(value: &[u8]) -> Result<usize, String> {
    let s = std::str::from_utf8(value).map_err(|e| format!("content-length not utf8: {}", e))?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty content-length".to_string());
    }
    trimmed
        .parse::<usize>()
        .map_err(|e| format!("invalid content-length '{}': {}", trimmed, e))
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Find the length of the first complete frame in `input`.
///
/// `input` must not start with an EOL; leading EOLs are heartbeats and are
/// handled by the caller. The returned length covers the command, headers,
/// body, the NUL terminator and at most one LF directly after it.
///
/// Returns `Ok(Some(len))` when a full frame is present, `Ok(None)` when more
/// bytes are required and `Err` on malformed input (header line without a
/// colon, bad `content-length`, sized body not followed by NUL).
pub fn frame_length(input: &[u8]) -> Result<Option<usize>, String> {
    let len = input.len();
    let mut pos;

    // command line; a NUL before the first LF ends a header-less frame
    match input.iter().position(|&b| b == b'\n' || b == 0) {
        Some(i) if input[i] == 0 => {
            pos = i + 1;
            if pos < len && input[pos] == b'\n' {
                pos += 1;
            }
            return Ok(Some(pos));
        }
        Some(i) => pos = i + 1,
        None => return Ok(None),
    }

    // headers until the blank line
    let mut content_length: Option<usize> = None;
    loop {
        if pos >= len {
            return Ok(None);
        }
        if input[pos] == b'\n' {
            pos += 1;
            break;
        }
        if input[pos] == b'\r' {
            if pos + 1 >= len {
                return Ok(None);
            }
            if input[pos + 1] == b'\n' {
                pos += 2;
                break;
            }
        }
        let line_end = match input[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => return Ok(None),
        };
        let line = strip_cr(&input[pos..pos + line_end]);
        match line.iter().position(|&b| b == b':') {
            Some(colon) => {
                if line[..colon].eq_ignore_ascii_case(b"content-length") {
                    content_length = Some(parse_content_length(&line[colon + 1..])?);
                }
            }
            None => {
                return Err(format!(
                    "malformed header line: {:?}",
                    String::from_utf8_lossy(line)
                ));
            }
        }
        pos += line_end + 1;
    }

    match content_length {
        Some(n) => {
            if pos + n + 1 > len {
                return Ok(None);
            }
            if input[pos + n] != 0 {
                return Err("missing NUL terminator after content-length body".to_string());
            }
            pos += n + 1;
        }
        None => match input[pos..].iter().position(|&b| b == 0) {
            Some(nul) => pos += nul + 1,
            None => return Ok(None),
        },
    }

    if pos < len && input[pos] == b'\n' {
        pos += 1;
    }
    Ok(Some(pos))
}
