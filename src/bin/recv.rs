//! RRP 수신 도구
//!
//! 수신한 버퍼를 표준 출력(또는 파일)에 기록한다. 로그는 표준 에러로 나간다.
//!
//! 사용법:
//!   cargo run --release --bin rrp-recv -- [OPTIONS] > received.bin
//!
//! 예시:
//!   # 기본 포트 (50005 바인드, 50006으로 보고)
//!   cargo run --release --bin rrp-recv -- --output received.bin

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rrp::report::ReportFormat;
use rrp::{Config, FaultModel, LossyChannel, Receiver, UdpChannel};

/// 수신 도구 설정
struct RecvOptions {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    output_path: Option<PathBuf>,
    loss_rate: f64,
    config: Config,
}

impl Default for RecvOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 50005)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 50006)),
            output_path: None,
            loss_rate: 0.0,
            config: Config::default(),
        }
    }
}

const HELP: &str = r#"RRP Recv - 손실 보고 기반 라운드형 전송 (수신)

사용법:
  cargo run --release --bin rrp-recv -- [OPTIONS] > received.bin

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:50005)
  -p, --peer <ADDR>       송신측 주소, 손실 보고 대상 (기본: 127.0.0.1:50006)
  -o, --output <PATH>     출력 파일 (기본: 표준 출력)
  --frame-size <SIZE>     프레임 크기 바이트, 양측 동일해야 함 (기본: 900)
  --timeout-ms <MS>       프레임 대기 타임아웃 (기본: 200)
  --max-idle <N>          완료 전 연속 타임아웃 허용 수 (기본: 50)
  --linger <N>            완료 후 재요청 응답 횟수 (기본: 10)
  --compact               압축 바이너리 손실 보고 사용
  --loss <RATE>           보고 손실 시뮬레이션 0.0~1.0
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG 환경 변수로 조정 (기본: info)
"#;

fn parse_args() -> Result<RecvOptions, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = RecvOptions::default();

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
            ("--output" | "-o", Some(v)) => {
                options.output_path = Some(PathBuf::from(v));
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
            ("--linger", Some(v)) => {
                options.config.linger_rounds = v.parse()?;
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
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = parse_args()?;

    info!("RRP Receiver starting...");
    info!("Bind address: {}", options.bind_addr);
    info!("Peer address: {}", options.peer_addr);
    info!("Frame size: {} bytes", options.config.frame_size);

    let udp = UdpChannel::bind(options.bind_addr, options.peer_addr).await?;
    let channel = LossyChannel::new(udp, FaultModel::lossy(options.loss_rate));
    let mut receiver = Receiver::new(options.config, channel)?;

    let data = receiver.receive().await?;
    info!("Received {} bytes", data.len());

    match &options.output_path {
        Some(path) => {
            std::fs::write(path, &data)?;
            info!("Saved to {:?}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }

    info!("Done: {}", receiver.stats().summary());
    Ok(())
}
