use std::time::Duration;

use actix_web::web;
use log::{info, warn};
use reqwest::Client;

use crate::structures::errors::SoilwatchError;

const READY_TIMEOUT: Duration = Duration::from_secs(45);
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(20);

const BLOCK_TAGS: [&str; 22] = [
    "address", "article", "br", "dd", "div", "dt", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "p", "section", "table", "td", "th", "tr",
];

#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Visible text of the page at `url`.
    async fn fetch(&self, url: &str) -> Result<String, SoilwatchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    ready_timeout: Duration,
    fallback_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            ready_timeout: READY_TIMEOUT,
            fallback_timeout: FALLBACK_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, ready: Duration, fallback: Duration) -> Self {
        self.ready_timeout = ready;
        self.fallback_timeout = fallback;
        self
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SoilwatchError> {
        if let Some(path) = url.strip_prefix("file://") {
            info!("Replaying captured page text from {}", path);
            let path = path.to_string();
            return Ok(web::block(move || std::fs::read_to_string(path)).await??);
        }

        info!("Loading {}", url);
        let body = match self.get(url, self.ready_timeout).await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                warn!(
                    "{} not ready after {:?}, retrying with {:?}",
                    url, self.ready_timeout, self.fallback_timeout
                );
                self.get(url, self.fallback_timeout).await?
            }
            Err(e) => return Err(e.into()),
        };

        let text = if body.contains('<') {
            html_to_text(&body)
        } else {
            body
        };
        let no_data = text.to_lowercase().matches("no data").count();
        if no_data > 0 {
            warn!("Found {} 'No data' indicator(s) on {}", no_data, url);
        }
        Ok(text)
    }
}

/// Reduce an HTML document to its visible text. Script and style contents
/// are dropped, block-level tags become line breaks, common entities are
/// decoded and whitespace is collapsed within each line.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(comment) = after.strip_prefix("!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }
        let Some(close) = tag_end(after) else {
            rest = "";
            break;
        };
        let opening = !after.starts_with('/');
        let name = tag_name(&after[..close]);
        rest = &after[close + 1..];

        if opening && (name == "script" || name == "style") {
            let closing = format!("</{name}");
            rest = match rest.to_ascii_lowercase().find(&closing) {
                Some(end) => {
                    let tail = &rest[end..];
                    tail.find('>').map_or("", |gt| &tail[gt + 1..])
                }
                None => "",
            };
        } else if BLOCK_TAGS.contains(&name.as_str()) {
            out.push('\n');
        }
    }
    out.push_str(rest);

    normalize_lines(&decode_entities(&out))
}

/// Offset of the `>` closing a tag, ignoring any inside quoted attributes.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&deg;", "°")
        .replace("&#176;", "°")
        .replace("&micro;", "µ")
        .replace("&#181;", "µ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn normalize_lines(s: &str) -> String {
    s.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    use super::*;

    fn read_request(stream: &mut TcpStream) {
        let mut buf = [0u8; 1024];
        let mut seen = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Local HTTP server. The first `stalled` connections never get an answer,
    /// every later one gets `status` and `body`. Returns the URL and a
    /// connection counter.
    fn serve(stalled: usize, status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/sensor", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream);
                if n < stalled {
                    thread::spawn(move || {
                        thread::sleep(Duration::from_secs(3));
                        drop(stream);
                    });
                } else {
                    let _ = write!(
                        stream,
                        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                }
            }
        });
        (url, hits)
    }

    fn fetcher() -> HttpFetcher {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpFetcher::new(client).with_timeouts(Duration::from_millis(200), Duration::from_secs(5))
    }

    #[actix_web::test]
    async fn stalled_page_is_retried_with_fallback_timeout() {
        let (url, hits) = serve(1, "200 OK", "<p>Temperature 21 &deg;C</p>");
        let text = fetcher().fetch(&url).await.unwrap();
        assert_eq!(text, "Temperature 21 °C");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn server_error_is_not_retried() {
        let (url, hits) = serve(0, "500 Internal Server Error", "down");
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, SoilwatchError::Fetch(_)), "{err}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quoted_angle_brackets_stay_inside_the_tag() {
        let html = r#"<div title="a>b 99 mg/L">GROWING PARAMETERS</div><p data-x='1>2'>N</p>"#;
        assert_eq!(html_to_text(html), "GROWING PARAMETERS\nN");
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(html_to_text("a<!-- <p>5 mg/L</p> -->b<!-- open"), "ab");
    }

    #[test]
    fn keeps_visible_text_only() {
        let html = r#"<html><head><style>.a { color: red }</style>
            <script type="text/javascript">var x = "21 °C";</script></head>
            <body><div class="panel">GROWING&nbsp;PARAMETERS</div>
            <div><span>12</span> <span>mg/L</span></div><p>23.4 &deg;C</p></body></html>"#;
        assert_eq!(html_to_text(html), "GROWING PARAMETERS\n12 mg/L\n23.4 °C");
    }

    #[test]
    fn uppercase_script_tags_are_removed() {
        assert_eq!(html_to_text("a<SCRIPT>b</SCRIPT>c"), "ac");
    }

    #[test]
    fn unterminated_tag_drops_the_tail() {
        assert_eq!(html_to_text("pH 6.5<div"), "pH 6.5");
    }

    #[test]
    fn entities_decode_after_tags_are_stripped() {
        assert_eq!(html_to_text("<p>&lt;b&gt; &amp; 5 &micro;S/cm</p>"), "<b> & 5 µS/cm");
    }
}
