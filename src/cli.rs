use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use reqbench::history::printer::history_table;
use reqbench::http::curl;
use reqbench::{
    CancelToken, Config, ConfigLoader, HistoryItem, HistoryStore, RequestData, ResponseData,
    ResponseType, Workbench,
};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 发送一个请求
    Send(SendArgs),
    /// 解析并发送一条 curl 命令
    Curl {
        /// 完整的 curl 命令（可带或不带开头的 `curl`）
        command: String,
        #[command(flatten)]
        options: SendOptions,
    },
    /// 查看和管理请求历史
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Args)]
pub struct SendArgs {
    /// HTTP 方法
    #[arg(short = 'X', long = "request", default_value = "GET")]
    pub method: String,
    /// 请求头，形如 'Name: value'，可重复
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
    /// 请求体
    #[arg(short = 'd', long = "data")]
    pub body: Option<String>,
    pub url: String,
    #[command(flatten)]
    pub options: SendOptions,
}

#[derive(Args)]
pub struct SendOptions {
    /// 超时（毫秒），覆盖配置文件
    #[arg(long)]
    pub timeout: Option<u64>,
    /// 不写入历史
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Subcommand)]
pub enum HistoryCommand {
    /// 最近的请求，最新的在前
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// 显示一条历史及其响应
    Show { id: u64 },
    /// 删除一条历史
    Delete { id: u64 },
}

impl SendArgs {
    fn to_request(&self) -> Result<RequestData> {
        let mut request = RequestData::new(&self.method, &self.url);
        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("header '{}' is not 'Name: value'", header))?;
            request = request.with_header(key.trim(), value.trim());
        }
        if let Some(body) = &self.body {
            request = request.with_body(body);
        }
        Ok(request)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load()?;

    match cli.command {
        Commands::Send(args) => {
            let request = args.to_request()?;
            send(&config, request, &args.options).await
        }
        Commands::Curl { command, options } => {
            let request = curl::parse_command(&command)?;
            send(&config, request, &options).await
        }
        Commands::History { command } => {
            let store = HistoryStore::new(config.history_dir())
                .with_capacity(config.history.max_items);
            history(&store, command)
        }
    }
}

async fn send(config: &Config, request: RequestData, options: &SendOptions) -> Result<()> {
    let mut config = config.clone();
    if options.no_history {
        config.history.enabled = false;
    }
    let mut workbench = Workbench::from_config(&config)?;
    if let Some(ms) = options.timeout {
        workbench = workbench.with_timeout(Duration::from_millis(ms));
    }

    // Ctrl-C 取消正在进行的请求
    let (handle, token) = CancelToken::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let (response, recorded) = workbench.send_and_record(&request, &token).await;
    println!("{}", render_response(&response));

    match recorded {
        Ok(Some(item)) => eprintln!("{}", format!("saved to history as #{}", item.id).dimmed()),
        Ok(None) => {}
        Err(e) => eprintln!("{}", format!("history not saved: {}", e).yellow()),
    }

    if response.is_failure() {
        bail!("request failed");
    }
    Ok(())
}

fn history(store: &HistoryStore, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { limit, offset } => {
            let items = store.list(limit, offset)?;
            if items.is_empty() {
                println!("No history yet");
            } else {
                println!("{}", history_table(&items));
            }
        }
        HistoryCommand::Show { id } => {
            let item = store.get(id)?;
            let response = store.response_of(id)?;
            println!("{}", render_item(&item));
            println!();
            println!("{}", render_response(&response));
        }
        HistoryCommand::Delete { id } => {
            store.delete(id)?;
            println!("Deleted #{}", id);
        }
    }
    Ok(())
}

fn status_line(response: &ResponseData) -> String {
    if let Some(error) = &response.error {
        return error.red().bold().to_string();
    }
    let line = format!(
        "HTTP {} {}",
        response.status_code,
        reason_phrase(response.status_code)
    );
    match response.status_code {
        200..=299 => line.green().bold().to_string(),
        300..=399 => line.cyan().bold().to_string(),
        400..=499 => line.yellow().bold().to_string(),
        _ => line.red().bold().to_string(),
    }
}

fn render_response(response: &ResponseData) -> String {
    let mut output = vec![status_line(response)];
    let timing = &response.timing;
    output.push(
        format!(
            "Time: {}ms (connect {}ms, transfer {}ms)",
            timing.total_time, timing.connect_time, timing.transfer_time
        )
        .cyan()
        .to_string(),
    );

    if !response.headers.is_empty() {
        output.push(String::new());
        for (key, value) in &response.headers {
            output.push(format!("{}: {}", key, value).blue().to_string());
        }
    }

    match (&response.formatted_body, response.response_type) {
        (_, ResponseType::Image) => {
            output.push(String::new());
            output.push(format!("<image, {} bytes base64>", response.body.len()));
        }
        (Some(body), _) if !body.is_empty() => {
            output.push(String::new());
            output.push(body.clone());
        }
        _ if !response.body.is_empty() => {
            output.push(String::new());
            output.push(response.body.clone());
        }
        _ => {}
    }

    output.join("\n")
}

fn render_item(item: &HistoryItem) -> String {
    [
        format!("#{} {}", item.id, item.created_at.to_rfc3339())
            .bold()
            .to_string(),
        item.full_command.clone(),
        format!(
            "request {} B, response {} B",
            item.request_size, item.response_size
        )
        .dimmed()
        .to_string(),
    ]
    .join("\n")
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqbench::http::timing::ResponseTiming;
    use std::collections::BTreeMap;

    #[test]
    fn test_send_args_to_request() {
        let cli = Cli::try_parse_from([
            "reqbench",
            "send",
            "-X",
            "POST",
            "-H",
            "Content-Type: application/json",
            "-d",
            r#"{"name":"foo"}"#,
            "https://example.com/items",
            "--timeout",
            "500",
        ])
        .unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        let request = args.to_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.body, r#"{"name":"foo"}"#);
        assert_eq!(args.options.timeout, Some(500));
    }

    #[test]
    fn test_bad_header_rejected() {
        let cli =
            Cli::try_parse_from(["reqbench", "send", "-H", "oops", "https://example.com"]).unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert!(args.to_request().is_err());
    }

    #[test]
    fn test_history_subcommands_parse() {
        let cli =
            Cli::try_parse_from(["reqbench", "history", "list", "--limit", "5", "--offset", "5"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                command: HistoryCommand::List { limit: 5, offset: 5 }
            }
        ));
    }

    #[test]
    fn test_render_response_prefers_formatted_body() {
        colored::control::set_override(false);
        let mut response = ResponseData::received(
            200,
            BTreeMap::new(),
            r#"{"a":1}"#.to_string(),
            ResponseTiming::default(),
        );
        response.formatted_body = Some("{\n  \"a\": 1\n}".to_string());
        let rendered = render_response(&response);
        assert!(rendered.starts_with("HTTP 200 OK"));
        assert!(rendered.ends_with("{\n  \"a\": 1\n}"));
    }
}
