//! 프로토콜 설정
//!
//! 프레임 크기와 타임아웃은 양 끝점이 사전에 합의한 값을 사용해야 한다.

use std::time::Duration;

use crate::report::ReportFormat;
use crate::{Error, Result, DEFAULT_FRAME_SIZE, FRAME_OVERHEAD, MAX_DATAGRAM, MIN_FRAME_SIZE};

/// RRP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 프레임 크기 (바이트, 양측 동일)
    pub frame_size: usize,

    /// 수신 대기 타임아웃 (밀리초)
    pub timeout_ms: u64,

    /// 연속으로 진전 없는 라운드 허용 횟수
    /// 초과 시 전송 실패
    pub max_idle_rounds: u32,

    /// 완료 후 SUMMARY 재요청에 응답할 최대 횟수
    /// 송신측 마지막 라운드 손실 대비
    pub linger_rounds: u32,

    /// 손실 보고 인코딩
    pub report_format: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            timeout_ms: 200,
            max_idle_rounds: 50,
            linger_rounds: 10,
            report_format: ReportFormat::Text,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 프레임당 페이로드 크기 (`B - 40`)
    pub fn payload_size(&self) -> usize {
        self.frame_size.saturating_sub(FRAME_OVERHEAD)
    }

    /// 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 완료 후 대기 타임아웃
    ///
    /// 송신측은 보고를 `timeout` 동안 기다린 뒤 재전송한다. 재전송 라운드가
    /// 통째로 몇 번 유실되어도 버틸 수 있도록 그 몇 배로 잡는다.
    pub fn linger_timeout(&self) -> Duration {
        self.timeout() * 4
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < MIN_FRAME_SIZE || self.frame_size > MAX_DATAGRAM {
            return Err(Error::InvalidFrameSize {
                size: self.frame_size,
                min: MIN_FRAME_SIZE,
                max: MAX_DATAGRAM,
            });
        }
        Ok(())
    }

    /// 로컬/저지연 링크용 설정
    pub fn low_latency() -> Self {
        Self {
            frame_size: 1400,
            timeout_ms: 50,
            max_idle_rounds: 40,
            linger_rounds: 5,
            report_format: ReportFormat::Text,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            timeout_ms: 500,
            max_idle_rounds: 200,
            linger_rounds: 20,
            report_format: ReportFormat::Compact,
        }
    }
}
