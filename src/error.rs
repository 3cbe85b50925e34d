//! 에러 타입 정의

use thiserror::Error;

use crate::frame::FrameError;

/// RRP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("수신 타임아웃")]
    Timeout,

    #[error("채널 종료")]
    ChannelClosed,

    #[error("프레임 에러: {0}")]
    Frame(#[from] FrameError),

    #[error("유효하지 않은 프레임 크기: {size} (최소 {min}, 최대 {max})")]
    InvalidFrameSize { size: usize, min: usize, max: usize },

    #[error("버퍼가 너무 큼: {size} bytes (최대 {max} bytes)")]
    BufferTooLarge { size: usize, max: usize },

    #[error("전송 실패: {rounds} 라운드 연속 진전 없음")]
    RoundsExhausted { rounds: u32 },

    #[error("비정상 손실 보고: entry={entry}, fragment_count={fragment_count}")]
    ImplausibleReport { entry: u64, fragment_count: u32 },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
