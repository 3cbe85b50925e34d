//! 전송 통계

use std::time::{Duration, Instant};

/// 한 번의 전송(송신 또는 수신)에 대한 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전체 버퍼 크기 (바이트)
    pub total_bytes: u64,

    /// 전체 조각 수
    pub total_fragments: u64,

    /// 진행한 라운드 수 (송신측)
    pub rounds: u64,

    /// DATA 프레임 수
    /// 송신측: 보낸 수, 수신측: 새로 조립된 수
    pub data_frames: u64,

    /// 재전송 DATA 프레임 수 (송신측)
    pub retransmitted_frames: u64,

    /// SUMMARY 프레임 수
    pub summary_frames: u64,

    /// 손실 보고 수
    /// 송신측: 수락한 보고, 수신측: 보낸 보고
    pub reports: u64,

    /// 무결성 검증에 실패한 손실 보고 수 (송신측)
    pub rejected_reports: u64,

    /// 길이/체크섬/크기 불일치로 버린 프레임 수 (수신측)
    pub rejected_frames: u64,

    /// 중복 수신 DATA 프레임 수 (수신측)
    pub duplicate_frames: u64,

    /// 수신 타임아웃 횟수
    pub timeouts: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_bytes: 0,
            total_fragments: 0,
            rounds: 0,
            data_frames: 0,
            retransmitted_frames: 0,
            summary_frames: 0,
            reports: 0,
            rejected_reports: 0,
            rejected_frames: 0,
            duplicate_frames: 0,
            timeouts: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율 (재전송 / 전체 DATA 프레임)
    pub fn retransmission_ratio(&self) -> f64 {
        if self.data_frames == 0 {
            return 0.0;
        }
        self.retransmitted_frames as f64 / self.data_frames as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Bytes: {} | Fragments: {} | Rounds: {} | Data: {} (retx {:.1}%) | Reports: {} (rejected {}) | Frames rejected: {} | Dup: {} | Timeouts: {}",
            self.elapsed().as_secs_f64(),
            self.total_bytes,
            self.total_fragments,
            self.rounds,
            self.data_frames,
            self.retransmission_ratio() * 100.0,
            self.reports,
            self.rejected_reports,
            self.rejected_frames,
            self.duplicate_frames,
            self.timeouts,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmission_ratio() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.retransmission_ratio(), 0.0);

        stats.data_frames = 4;
        stats.retransmitted_frames = 1;
        assert!((stats.retransmission_ratio() - 0.25).abs() < f64::EPSILON);
        assert!(stats.summary().contains("retx 25.0%"));
    }
}
