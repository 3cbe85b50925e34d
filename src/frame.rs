//! 프레임 코덱
//!
//! 모든 프레임은 정확히 `B` 바이트다. 길이가 다르면 체크섬을 계산하기 전에 버린다.
//!
//! ```text
//! ┌──────┬───────────┬─────────────┬───────────────────┬────────────────────┐
//! │ kind │ index     │ remaining   │ payload           │ trailer            │
//! │ 1 B  │ 3 B (BE)  │ 4 B (BE)    │ B - 40 (0 padded) │ 32 B, 하위 4B 체크섬 │
//! └──────┴───────────┴─────────────┴───────────────────┴────────────────────┘
//! ```
//!
//! 체크섬은 트레일러를 제외한 `0..B-32` 구간의 Fletcher-32 값이다.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::checksum::fletcher32;
use crate::{Error, HEADER_LEN, MAX_DATAGRAM, MAX_FRAGMENTS, MIN_FRAME_SIZE, TRAILER_LEN};

/// 프레임 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// 라운드 종료 + 손실 보고 요청 (remaining = 전체 크기)
    Summary = 0,

    /// 데이터 조각
    Data = 127,
}

impl FrameKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FrameKind::Summary),
            127 => Some(FrameKind::Data),
            _ => None,
        }
    }
}

/// 프레임 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("프레임 길이 불일치: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("체크섬 불일치: expected {expected:08X}, got {got:08X}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("알 수 없는 프레임 종류: {0}")]
    UnknownKind(u8),

    #[error("페이로드 초과: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("조각 인덱스 범위 초과: {0}")]
    IndexOutOfRange(u32),
}

/// 디코딩된 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,

    /// 조각 인덱스 (0부터)
    pub index: u32,

    /// DATA: 이 조각 시작점부터 버퍼 끝까지 남은 바이트
    /// SUMMARY: 전체 버퍼 크기
    pub remaining: u32,

    /// 패딩 포함 페이로드 (`B - 40` bytes)
    pub payload: Bytes,
}

impl Frame {
    /// 패딩을 제외한 유효 페이로드
    pub fn data(&self) -> &[u8] {
        let len = self.payload.len().min(self.remaining as usize);
        &self.payload[..len]
    }

    /// 이 프레임이 암시하는 전체 버퍼 크기
    pub fn implied_total(&self, payload_size: usize) -> u64 {
        match self.kind {
            FrameKind::Summary => self.remaining as u64,
            FrameKind::Data => self.index as u64 * payload_size as u64 + self.remaining as u64,
        }
    }
}

/// 고정 크기 프레임 인코더/디코더
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    frame_size: usize,
}

impl FrameCodec {
    /// 새 코덱 생성
    pub fn new(frame_size: usize) -> crate::Result<Self> {
        if !(MIN_FRAME_SIZE..=MAX_DATAGRAM).contains(&frame_size) {
            return Err(Error::InvalidFrameSize {
                size: frame_size,
                min: MIN_FRAME_SIZE,
                max: MAX_DATAGRAM,
            });
        }
        Ok(Self { frame_size })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn payload_size(&self) -> usize {
        self.checksum_pivot() - HEADER_LEN
    }

    fn checksum_pivot(&self) -> usize {
        self.frame_size - TRAILER_LEN
    }

    /// 프레임 인코딩
    pub fn encode(
        &self,
        kind: FrameKind,
        index: u32,
        remaining: u32,
        payload: &[u8],
    ) -> Result<Bytes, FrameError> {
        if payload.len() > self.payload_size() {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: self.payload_size(),
            });
        }
        if index >= MAX_FRAGMENTS {
            return Err(FrameError::IndexOutOfRange(index));
        }

        let mut buf = BytesMut::zeroed(self.frame_size);
        buf[0] = kind as u8;
        buf[1..4].copy_from_slice(&index.to_be_bytes()[1..]);
        buf[4..8].copy_from_slice(&remaining.to_be_bytes());
        buf[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

        let pivot = self.checksum_pivot();
        let checksum = fletcher32(&buf[..pivot]);
        buf[self.frame_size - 4..].copy_from_slice(&checksum.to_be_bytes());

        Ok(buf.freeze())
    }

    /// DATA 프레임 인코딩
    pub fn data(&self, index: u32, remaining: u32, payload: &[u8]) -> Result<Bytes, FrameError> {
        self.encode(FrameKind::Data, index, remaining, payload)
    }

    /// SUMMARY 프레임 인코딩
    pub fn summary(&self, total_size: u32) -> Result<Bytes, FrameError> {
        self.encode(FrameKind::Summary, 0, total_size, &[])
    }

    /// 프레임 디코딩
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, FrameError> {
        // 길이 검사가 체크섬 계산보다 먼저
        if bytes.len() != self.frame_size {
            return Err(FrameError::LengthMismatch {
                expected: self.frame_size,
                got: bytes.len(),
            });
        }

        let pivot = self.checksum_pivot();
        let got = u32::from_be_bytes([
            bytes[self.frame_size - 4],
            bytes[self.frame_size - 3],
            bytes[self.frame_size - 2],
            bytes[self.frame_size - 1],
        ]);
        let expected = fletcher32(&bytes[..pivot]);
        if expected != got {
            return Err(FrameError::ChecksumMismatch { expected, got });
        }

        let kind = FrameKind::from_byte(bytes[0]).ok_or(FrameError::UnknownKind(bytes[0]))?;
        let index = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
        let remaining = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        Ok(Frame {
            kind,
            index,
            remaining,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..pivot]),
        })
    }
}
