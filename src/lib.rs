//! # RRP (Round-based Retransmission Protocol)
//!
//! 손실 보고 기반 라운드형 대용량 전송 프로토콜
//!
//! ## 핵심 특징
//! - **고정 크기 프레임**: 길이만으로 1차 필터링, 이후 Fletcher-32 검증
//! - **라운드 기반 재전송**: 한 라운드 = 미확인 조각 전송 + SUMMARY + 손실 보고
//! - **손실 보고**: 수신측이 누락 조각 ID 목록(최대 용량까지)을 회신
//! - **점진적 복구**: 용량을 넘는 손실도 여러 라운드에 걸쳐 수렴
//! - **채널 추상화**: UDP, 메모리, 장애 주입 채널을 동일 엔진으로 구동

pub mod channel;
pub mod checksum;
pub mod config;
pub mod error;
pub mod frame;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod stats;
pub mod transfer;

pub use channel::{Channel, FaultModel, LossyChannel, MemoryChannel, UdpChannel};
pub use checksum::fletcher32;
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Frame, FrameCodec, FrameError, FrameKind};
pub use receiver::Receiver;
pub use report::{LossReport, ReportError, ReportFormat};
pub use sender::Sender;
pub use stats::TransferStats;
pub use transfer::{InboundTransfer, OutboundTransfer};

/// 기본 프레임 크기 (바이트)
pub const DEFAULT_FRAME_SIZE: usize = 900;

/// 프레임 헤더 크기: kind(1) + index(3) + remaining(4)
pub const HEADER_LEN: usize = 8;

/// 체크섬 트레일러 크기 (하위 4바이트만 사용)
pub const TRAILER_LEN: usize = 32;

/// 프레임당 고정 오버헤드
pub const FRAME_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

/// 최소 프레임 크기 (페이로드 1바이트)
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD + 1;

/// 최대 데이터그램 크기
pub const MAX_DATAGRAM: usize = 65535;

/// 조각 인덱스 상한 (3바이트)
pub const MAX_FRAGMENTS: u32 = 1 << 24;
