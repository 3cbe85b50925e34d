//! RRP 송신 도구
//!
//! 표준 입력(또는 파일)의 내용을 UDP로 전달한다.
//!
//! 사용법:
//!   cargo run --release --bin rrp-send -- [OPTIONS] < data.bin
//!
//! 예시:
//!   # 기본 포트 (50006 바인드, 50005로 전송)
//!   cargo run --release --bin rrp-send -- --file data.bin
//!
//!   # 20% 손실 시뮬레이션
//!   cargo run --release --bin rrp-send -- -f data.bin --loss 0.2

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rrp::report::ReportFormat;
use rrp::{Config, FaultModel, LossyChannel, Sender, UdpChannel};

/// 송신 도구 설정
struct SendOptions {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    file_path: Option<PathBuf>,
    loss_rate: f64,
    config: Config,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 50006)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 50005)),
            file_path: None,
            loss_rate: 0.0,
            config: Config::default(),
        }
    }
}

const HELP: &str = r#"RRP Send - 손실 보고 기반 라운드형 전송 (송신)

사용법:
  cargo run --release --bin rrp-send -- [OPTIONS] < data.bin

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:50006)
  -p, --peer <ADDR>       수신측 주소 (기본: 127.0.0.1:50005)
  -f, --file <PATH>       전송할 파일 (기본: 표준 입력)
  --frame-size <SIZE>     프레임 크기 바이트, 양측 동일해야 함 (기본: 900)
  --timeout-ms <MS>       손실 보고 대기 타임아웃 (기본: 200)
  --max-idle <N>          연속 무응답 라운드 허용 수 (기본: 50)
  --compact               압축 바이너리 손실 보고 사용
  --loss <RATE>           송신 손실 시뮬레이션 0.0~1.0
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG 환경 변수로 조정 (기본: info)
"#;

fn parse_args() -> Result<SendOptions, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = SendOptions::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match (args[i].as_str(), value) {
            ("--bind" | "-b", Some(v)) => {
                options.bind_addr = v.parse()?;
                i += 1;
            }
            ("--peer" | "-p", Some(v)) => {
                options.peer_addr = v.parse()?;
                i += 1;
            }
            ("--file" | "-f", Some(v)) => {
                options.file_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--frame-size", Some(v)) => {
                options.config.frame_size = v.parse()?;
                i += 1;
            }
            ("--timeout-ms", Some(v)) => {
                options.config.timeout_ms = v.parse()?;
                i += 1;
            }
            ("--max-idle", Some(v)) => {
                options.config.max_idle_rounds = v.parse()?;
                i += 1;
            }
            ("--loss", Some(v)) => {
                options.loss_rate = v.parse()?;
                i += 1;
            }
            ("--compact", _) => {
                options.config.report_format = ReportFormat::Compact;
            }
            ("--help" | "-h", _) => {
                eprintln!("{}", HELP);
                std::process::exit(0);
            }
            (other, _) => return Err(format!("알 수 없는 옵션: {}", other).into()),
        }
        i += 1;
    }

    options.config.validate()?;
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (표준 출력은 비워 둠)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = parse_args()?;

    let data = match &options.file_path {
        Some(path) => {
            info!("Loading file: {:?}", path);
            std::fs::read(path)?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    info!("RRP Sender starting...");
    info!("Bind address: {}", options.bind_addr);
    info!("Peer address: {}", options.peer_addr);
    info!("Frame size: {} bytes", options.config.frame_size);
    info!("Data size: {} bytes", data.len());

    let udp = UdpChannel::bind(options.bind_addr, options.peer_addr).await?;
    let channel = LossyChannel::new(udp, FaultModel::lossy(options.loss_rate));
    let mut sender = Sender::new(options.config, channel)?;

    // 진행 상황 출력
    let stats = sender.stats_handle();
    let progress = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        loop {
            interval.tick().await;
            let summary = stats.read().summary();
            info!("Progress: {}", summary);
        }
    });

    let result = sender.transfer(Bytes::from(data)).await;
    progress.abort();
    result?;

    info!("Done: {}", sender.stats().summary());
    Ok(())
}
