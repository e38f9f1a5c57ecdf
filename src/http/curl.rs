//! curl command interop: parse a pasted command into a `RequestData`, and
//! render a request back into the one-line command kept in history.

use crate::http::request::RequestData;
use crate::{ReqbenchError, Result};

/// Flags whose value we do not use but must not mistake for the URL.
const IGNORED_WITH_VALUE: &[&str] = &[
    "-o",
    "--output",
    "-m",
    "--max-time",
    "--connect-timeout",
    "-u",
    "--user",
    "-w",
    "--write-out",
    "-x",
    "--proxy",
    "--retry",
    "-c",
    "--cookie-jar",
    "-D",
    "--dump-header",
];

/// Splits a command line the way a POSIX shell would for the subset curl
/// users paste: single quotes are literal, double quotes allow `\"`, `\\`,
/// `\$` and `` \` ``, a bare backslash escapes the next character and a
/// backslash-newline is a line continuation.
pub fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '\\' | '$' | '`')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated('"')),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(ch) => {
                    in_token = true;
                    current.push(ch);
                }
                None => {
                    in_token = true;
                    current.push('\\');
                }
            },
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn unterminated(quote: char) -> ReqbenchError {
    ReqbenchError::Validation(format!("unterminated {} quote in curl command", quote))
}

/// Parses a curl command line. The leading `curl` word is optional.
pub fn parse_command(command: &str) -> Result<RequestData> {
    let mut args = tokenize(command)?.into_iter().peekable();
    if args.peek().is_some_and(|first| first == "curl") {
        args.next();
    }

    let mut method: Option<String> = None;
    let mut url = String::new();
    let mut request = RequestData::default();
    let mut has_data = false;
    let mut force_get = false;

    while let Some(arg) = args.next() {
        // -XPOST / --request=POST style
        let (flag, inline) = split_flag(&arg);
        let mut value = |name: &str| -> Result<String> {
            match inline.clone() {
                Some(v) => Ok(v),
                None => args.next().ok_or_else(|| {
                    ReqbenchError::Validation(format!("curl option {} needs a value", name))
                }),
            }
        };

        match flag.as_str() {
            "-X" | "--request" => method = Some(value(&flag)?.to_uppercase()),
            "-H" | "--header" => {
                let header = value(&flag)?;
                if let Some((key, val)) = header.split_once(':') {
                    request
                        .headers
                        .insert(key.trim().to_string(), val.trim().to_string());
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii" => {
                let data = value(&flag)?;
                if has_data {
                    request.body.push('&');
                }
                request.body.push_str(&data);
                has_data = true;
            }
            "-A" | "--user-agent" => {
                request
                    .headers
                    .insert("User-Agent".to_string(), value(&flag)?);
            }
            "-e" | "--referer" => {
                request.headers.insert("Referer".to_string(), value(&flag)?);
            }
            "-b" | "--cookie" => {
                request.headers.insert("Cookie".to_string(), value(&flag)?);
            }
            "--url" => url = value(&flag)?,
            "-I" | "--head" => method = Some("HEAD".to_string()),
            "-G" | "--get" => force_get = true,
            f if IGNORED_WITH_VALUE.contains(&f) => {
                value(&flag)?;
            }
            // 其他未知选项忽略
            f if f.starts_with('-') && f.len() > 1 => {}
            _ => {
                if url.is_empty() {
                    url = arg;
                }
            }
        }
    }

    if url.is_empty() {
        return Err(ReqbenchError::Validation(
            "curl command has no URL".to_string(),
        ));
    }

    // 有 body 且未指定方法时，curl 默认使用 POST
    request.method = match method {
        Some(m) => m,
        None if has_data && !force_get => "POST".to_string(),
        None => "GET".to_string(),
    };
    request.url = url;
    Ok(request)
}

fn split_flag(arg: &str) -> (String, Option<String>) {
    if let Some(rest) = arg.strip_prefix("--") {
        if let Some((name, value)) = rest.split_once('=') {
            return (format!("--{}", name), Some(value.to_string()));
        }
        return (arg.to_string(), None);
    }
    // short options that take a value may be glued to it: -XPOST, -HAccept:x
    if arg.len() > 2 && arg.starts_with('-') && arg.is_char_boundary(2) {
        let (flag, value) = arg.split_at(2);
        if matches!(flag, "-X" | "-H" | "-d" | "-A" | "-e" | "-b") {
            return (flag.to_string(), Some(value.to_string()));
        }
    }
    (arg.to_string(), None)
}

/// Renders the request as one curl command line that `parse_command` reads
/// back into an equal `RequestData`.
pub fn to_command(request: &RequestData) -> String {
    let mut parts = vec!["curl".to_string()];
    let method = request.method.to_uppercase();
    if method != "GET" || !request.body.is_empty() {
        parts.push("-X".to_string());
        parts.push(quote(&method));
    }
    for (key, value) in &request.headers {
        parts.push("-H".to_string());
        parts.push(quote(&format!("{}: {}", key, value)));
    }
    if !request.body.is_empty() {
        parts.push("--data-raw".to_string());
        parts.push(quote(&request.body));
    }
    parts.push(quote(&request.url));
    parts.join(" ")
}

/// Single-quotes a word for a POSIX shell.
fn quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_quotes_and_escapes() {
        let tokens = tokenize(r#"curl -H "X-A: \"q\"" 'it'\''s' a\ b"#).unwrap();
        assert_eq!(tokens, vec!["curl", "-H", r#"X-A: "q""#, "it's", "a b"]);
    }

    #[test]
    fn test_tokenize_line_continuation() {
        let tokens = tokenize("curl \\\n  https://example.com").unwrap();
        assert_eq!(tokens, vec!["curl", "https://example.com"]);
    }

    #[test]
    fn test_tokenize_keeps_empty_quoted_word() {
        assert_eq!(tokenize("-d ''").unwrap(), vec!["-d", ""]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert!(tokenize("curl 'oops").is_err());
    }

    #[test]
    fn test_parse_full_command() {
        let request = parse_command(
            r#"curl -X PUT -H 'Content-Type: application/json' -d '{"name":"foo"}' https://example.com/items/1"#,
        )
        .unwrap();
        assert_eq!(request.method, "PUT");
        assert_eq!(request.url, "https://example.com/items/1");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.body, r#"{"name":"foo"}"#);
    }

    #[test]
    fn test_data_implies_post() {
        let request = parse_command("curl example.com -d name=foo").unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "example.com");
    }

    #[test]
    fn test_get_flag_keeps_get() {
        let request = parse_command("curl -G -d q=search https://example.com").unwrap();
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn test_glued_and_equals_forms() {
        let request =
            parse_command("curl -XDELETE --header=Accept:text/plain https://example.com").unwrap();
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.headers["Accept"], "text/plain");
    }

    #[test]
    fn test_ignored_options_do_not_steal_url() {
        let request =
            parse_command("curl -s -o out.json --max-time 5 -A bench/1.0 https://example.com")
                .unwrap();
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers["User-Agent"], "bench/1.0");
    }

    #[test]
    fn test_head_flag() {
        assert_eq!(parse_command("curl -I https://example.com").unwrap().method, "HEAD");
    }

    #[test]
    fn test_missing_url_is_error() {
        let err = parse_command("curl -X POST").unwrap_err();
        assert!(err.to_string().contains("no URL"));
    }

    #[test]
    fn test_to_command_simple_get() {
        let request = RequestData::new("GET", "https://example.com/ok");
        assert_eq!(to_command(&request), "curl https://example.com/ok");
    }

    #[test]
    fn test_to_command_reparses_to_same_request() {
        let request = RequestData::new("POST", "https://example.com/a?b=c&d=e")
            .with_header("Content-Type", "application/json")
            .with_header("X-Note", "it's \"quoted\"")
            .with_body(r#"{"msg":"hello 'world'"}"#);
        let command = to_command(&request);
        assert_eq!(parse_command(&command).unwrap(), request);
    }

    #[test]
    fn test_to_command_get_with_body_keeps_method() {
        let request = RequestData::new("GET", "https://example.com").with_body("x=1");
        let parsed = parse_command(&to_command(&request)).unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.body, "x=1");
    }
}
