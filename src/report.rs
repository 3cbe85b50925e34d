//! 손실 보고 (수신측 → 송신측)
//!
//! 수신측이 SUMMARY 프레임을 받을 때마다 회신하는 유일한 역방향 메시지.
//! 누락 조각 ID는 1부터 시작하며, 0은 "항목 없음" 채움값이다.
//!
//! - `Text`: `[a, b, ..., z]` 형태의 정수 101개. 앞 100개가 누락 ID, 마지막이 그 합
//! - `Compact`: bincode 직렬화 + CRC32. 용량은 프레임 크기에서 유도

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Result;

/// 텍스트 보고의 ID 슬롯 수
pub const REPORT_SLOTS: usize = 100;

/// 압축 보고 매직 넘버 ("RRPL")
const COMPACT_MAGIC: u32 = 0x5252_504C;

/// 압축 보고 고정 오버헤드: magic(4) + vec len(8) + crc32(4)
const COMPACT_OVERHEAD: usize = 16;

/// 손실 보고 인코딩 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// 괄호로 감싼 쉼표 구분 정수 101개
    #[default]
    Text,

    /// 체크섬 보호 바이너리
    Compact,
}

/// 손실 보고 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("형식 오류: {0}")]
    Malformed(String),

    #[error("합계 불일치: expected {expected}, got {got}")]
    SumMismatch { expected: u64, got: u64 },

    #[error("유효하지 않은 매직 넘버: {0:08X}")]
    BadMagic(u32),

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactReport {
    magic: u32,
    missing: Vec<u32>,
    crc32: u32,
}

fn crc_of(ids: &[u32]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for id in ids {
        hasher.update(&id.to_le_bytes());
    }
    hasher.finalize()
}

/// 손실 보고
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LossReport {
    /// 누락 조각 ID (1부터)
    missing: Vec<u32>,
}

impl LossReport {
    /// 누락 ID 목록으로 생성 (0은 무시)
    pub fn from_missing(missing: Vec<u32>) -> Self {
        Self {
            missing: missing.into_iter().filter(|&id| id != 0).collect(),
        }
    }

    /// "모두 수신" 보고
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// 누락 ID (1부터)
    pub fn missing(&self) -> &[u32] {
        &self.missing
    }

    /// 누락 조각 인덱스 (0부터). ID 0은 건너뜀
    pub fn zero_based(&self) -> impl Iterator<Item = u32> + '_ {
        self.missing.iter().filter_map(|&id| id.checked_sub(1))
    }

    pub fn len(&self) -> usize {
        self.missing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    /// 보고 하나에 담을 수 있는 최대 ID 수
    pub fn capacity(format: ReportFormat, frame_size: usize) -> usize {
        match format {
            ReportFormat::Text => REPORT_SLOTS,
            ReportFormat::Compact => (frame_size.saturating_sub(COMPACT_OVERHEAD) / 4).max(1),
        }
    }

    /// 바이트로 직렬화
    pub fn encode(&self, format: ReportFormat) -> Result<Bytes> {
        match format {
            ReportFormat::Text => Ok(Bytes::from(self.encode_text())),
            ReportFormat::Compact => {
                let report = CompactReport {
                    magic: COMPACT_MAGIC,
                    crc32: crc_of(&self.missing),
                    missing: self.missing.clone(),
                };
                Ok(Bytes::from(bincode::serialize(&report)?))
            }
        }
    }

    fn encode_text(&self) -> String {
        let mut slots = [0u64; REPORT_SLOTS];
        for (slot, &id) in slots.iter_mut().zip(&self.missing) {
            *slot = id as u64;
        }
        let sum: u64 = slots.iter().sum();

        let entries: Vec<String> = slots
            .iter()
            .chain(std::iter::once(&sum))
            .map(|v| v.to_string())
            .collect();
        format!("[{}]", entries.join(", "))
    }

    /// 바이트에서 역직렬화 및 무결성 검증
    pub fn decode(bytes: &[u8], format: ReportFormat) -> std::result::Result<Self, ReportError> {
        match format {
            ReportFormat::Text => Self::decode_text(bytes),
            ReportFormat::Compact => Self::decode_compact(bytes),
        }
    }

    fn decode_text(bytes: &[u8]) -> std::result::Result<Self, ReportError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ReportError::Malformed("UTF-8 아님".into()))?;
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(|| ReportError::Malformed("괄호 누락".into()))?;

        let entries = inner
            .split(',')
            .map(|s| s.trim().parse::<u64>())
            .collect::<std::result::Result<Vec<u64>, _>>()
            .map_err(|e| ReportError::Malformed(e.to_string()))?;

        if entries.len() != REPORT_SLOTS + 1 {
            return Err(ReportError::Malformed(format!(
                "항목 수 {} (기대값 {})",
                entries.len(),
                REPORT_SLOTS + 1
            )));
        }

        let (ids, trailer) = entries.split_at(REPORT_SLOTS);
        if let Some(&too_big) = ids.iter().find(|&&id| id > u32::MAX as u64) {
            return Err(ReportError::Malformed(format!("ID 범위 초과: {}", too_big)));
        }

        let sum: u64 = ids.iter().sum();
        if sum != trailer[0] {
            return Err(ReportError::SumMismatch {
                expected: sum,
                got: trailer[0],
            });
        }

        // 끝쪽 0만 채움값. 중간의 0은 ID로 남겨 송신측이 판단
        let used = ids.iter().rposition(|&id| id != 0).map_or(0, |last| last + 1);
        Ok(Self {
            missing: ids[..used].iter().map(|&id| id as u32).collect(),
        })
    }

    fn decode_compact(bytes: &[u8]) -> std::result::Result<Self, ReportError> {
        if bytes.len() < COMPACT_OVERHEAD || bytes.len() > crate::MAX_DATAGRAM {
            return Err(ReportError::Malformed(format!("길이 {}", bytes.len())));
        }

        let report: CompactReport =
            bincode::deserialize(bytes).map_err(|e| ReportError::Malformed(e.to_string()))?;

        if report.magic != COMPACT_MAGIC {
            return Err(ReportError::BadMagic(report.magic));
        }

        let expected = crc_of(&report.missing);
        if expected != report.crc32 {
            return Err(ReportError::CrcMismatch {
                expected,
                got: report.crc32,
            });
        }

        Ok(Self {
            missing: report.missing,
        })
    }
}
