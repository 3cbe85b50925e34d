//! 전송 세션 상태
//!
//! - OutboundTransfer: 송신측. 버퍼를 조각으로 나누고 미확인 조각 집합을 관리
//! - InboundTransfer: 수신측. 조각을 퍼즐처럼 조립하고 누락 비트맵을 관리
//!
//! 두 상태 모두 한 번의 `transfer()`/`receive()` 호출 동안만 존재한다.

use std::collections::BTreeSet;

use bytes::{Bytes, BytesMut};

use crate::report::LossReport;
use crate::{Error, Result, MAX_FRAGMENTS};

fn fragment_count_for(len: u64, payload_size: usize) -> u64 {
    let payload = payload_size.max(1) as u64;
    (len + payload - 1) / payload
}

fn check_size(len: u64, payload_size: usize) -> Result<u32> {
    let max = (MAX_FRAGMENTS as u64 * payload_size as u64).min(u32::MAX as u64);
    let count = fragment_count_for(len, payload_size);
    if len > u32::MAX as u64 || count > MAX_FRAGMENTS as u64 {
        return Err(Error::BufferTooLarge {
            size: len as usize,
            max: max as usize,
        });
    }
    Ok(count as u32)
}

/// 송신측 전송 상태
#[derive(Debug)]
pub struct OutboundTransfer {
    /// 원본 버퍼 (불변)
    buffer: Bytes,

    payload_size: usize,

    fragment_count: u32,

    /// 아직 확인되지 않은 조각 인덱스 (오름차순)
    pending: BTreeSet<u32>,
}

impl OutboundTransfer {
    /// 새 송신 상태 생성. 모든 조각이 미확인 상태로 시작
    pub fn new(buffer: Bytes, payload_size: usize) -> Result<Self> {
        let fragment_count = check_size(buffer.len() as u64, payload_size)?;

        Ok(Self {
            buffer,
            payload_size,
            fragment_count,
            pending: (0..fragment_count).collect(),
        })
    }

    pub fn total_size(&self) -> u32 {
        self.buffer.len() as u32
    }

    pub fn fragment_count(&self) -> u32 {
        self.fragment_count
    }

    /// 미확인 조각 인덱스 (오름차순)
    pub fn pending(&self) -> impl Iterator<Item = u32> + '_ {
        self.pending.iter().copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 조각 데이터와 선언 잔여 바이트 수
    pub fn fragment(&self, index: u32) -> Option<(u32, &[u8])> {
        if index >= self.fragment_count {
            return None;
        }
        let offset = index as usize * self.payload_size;
        let end = (offset + self.payload_size).min(self.buffer.len());
        let remaining = (self.buffer.len() - offset) as u32;
        Some((remaining, &self.buffer[offset..end]))
    }

    /// 손실 보고 반영: 보고된 조각만 다음 라운드 대상으로 남김
    ///
    /// 조각 수로 설명되지 않는 보고는 채널 오염 또는 프로토콜 불일치로 간주한다.
    pub fn apply_report(&mut self, report: &LossReport) -> Result<()> {
        if report.len() > self.fragment_count as usize {
            return Err(Error::ImplausibleReport {
                entry: report.len() as u64,
                fragment_count: self.fragment_count,
            });
        }
        if let Some(&id) = report
            .missing()
            .iter()
            .find(|&&id| id == 0 || id > self.fragment_count)
        {
            return Err(Error::ImplausibleReport {
                entry: id as u64,
                fragment_count: self.fragment_count,
            });
        }

        self.pending = report.zero_based().collect();
        Ok(())
    }

    /// 모든 조각 확인 여부
    pub fn is_acknowledged(&self) -> bool {
        self.pending.is_empty()
    }
}

/// 수신측 조립 상태
#[derive(Debug)]
pub struct InboundTransfer {
    /// 조립 버퍼 (전체 크기)
    data: BytesMut,

    payload_size: usize,

    /// 수신된 조각 비트맵
    received: Vec<bool>,

    /// 아직 받지 못한 조각 수
    remaining: u32,
}

impl InboundTransfer {
    /// 첫 유효 프레임에서 결정된 전체 크기로 생성
    pub fn new(total_size: u64, payload_size: usize) -> Result<Self> {
        let fragment_count = check_size(total_size, payload_size)?;

        Ok(Self {
            data: BytesMut::zeroed(total_size as usize),
            payload_size,
            received: vec![false; fragment_count as usize],
            remaining: fragment_count,
        })
    }

    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    pub fn fragment_count(&self) -> u32 {
        self.received.len() as u32
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// 조각 삽입. 처음 받은 조각이면 true
    ///
    /// 이미 받은 조각이나 범위 밖 인덱스는 상태를 바꾸지 않는다.
    pub fn insert(&mut self, index: u32, fragment: &[u8]) -> bool {
        let slot = index as usize;
        if slot >= self.received.len() || self.received[slot] {
            return false;
        }

        let offset = slot * self.payload_size;
        let end = (offset + fragment.len()).min(self.data.len());
        self.data[offset..end].copy_from_slice(&fragment[..end - offset]);

        self.received[slot] = true;
        self.remaining -= 1;
        true
    }

    pub fn is_received(&self, index: u32) -> bool {
        self.received.get(index as usize).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// 누락 조각 ID (1부터, 오름차순, 최대 `limit`개)
    pub fn missing_ids(&self, limit: usize) -> Vec<u32> {
        self.received
            .iter()
            .enumerate()
            .filter(|(_, &received)| !received)
            .map(|(index, _)| index as u32 + 1)
            .take(limit)
            .collect()
    }

    /// 현재 상태의 손실 보고
    pub fn loss_report(&self, limit: usize) -> LossReport {
        LossReport::from_missing(self.missing_ids(limit))
    }

    /// 완료된 데이터 추출
    pub fn into_data(self) -> Bytes {
        self.data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportFormat, REPORT_SLOTS};

    #[test]
    fn test_outbound_fragments() {
        let data: Vec<u8> = (0..2050u32).map(|i| i as u8).collect();
        let transfer = OutboundTransfer::new(Bytes::from(data.clone()), 860).unwrap();

        assert_eq!(transfer.fragment_count(), 3);
        assert_eq!(transfer.pending().collect::<Vec<_>>(), vec![0, 1, 2]);

        let (remaining, chunk) = transfer.fragment(0).unwrap();
        assert_eq!((remaining, chunk.len()), (2050, 860));
        let (remaining, chunk) = transfer.fragment(1).unwrap();
        assert_eq!((remaining, chunk.len()), (1190, 860));
        let (remaining, chunk) = transfer.fragment(2).unwrap();
        assert_eq!((remaining, chunk.len()), (330, 330));
        assert_eq!(chunk, &data[1720..]);
        assert!(transfer.fragment(3).is_none());
    }

    #[test]
    fn test_outbound_empty_buffer() {
        let transfer = OutboundTransfer::new(Bytes::new(), 860).unwrap();
        assert_eq!(transfer.fragment_count(), 0);
        assert!(transfer.is_acknowledged());
    }

    #[test]
    fn test_outbound_too_many_fragments() {
        let data = Bytes::from(vec![0u8; MAX_FRAGMENTS as usize + 1]);
        assert!(matches!(
            OutboundTransfer::new(data, 1),
            Err(Error::BufferTooLarge { .. })
        ));
    }

    #[test]
    fn test_apply_report() {
        let mut transfer = OutboundTransfer::new(Bytes::from(vec![1u8; 5000]), 860).unwrap();
        assert_eq!(transfer.fragment_count(), 6);

        transfer
            .apply_report(&LossReport::from_missing(vec![2, 6]))
            .unwrap();
        assert_eq!(transfer.pending().collect::<Vec<_>>(), vec![1, 5]);

        transfer.apply_report(&LossReport::complete()).unwrap();
        assert!(transfer.is_acknowledged());
    }

    #[test]
    fn test_apply_implausible_report() {
        let mut transfer = OutboundTransfer::new(Bytes::from(vec![1u8; 2050]), 860).unwrap();

        let result = transfer.apply_report(&LossReport::from_missing(vec![4]));
        assert!(matches!(
            result,
            Err(Error::ImplausibleReport {
                entry: 4,
                fragment_count: 3
            })
        ));

        let result = transfer.apply_report(&LossReport::from_missing(vec![1, 2, 3, 1]));
        assert!(matches!(result, Err(Error::ImplausibleReport { .. })));

        // 채움값 사이에 끼어든 0은 ID 0으로 취급
        let mut entries = vec!["0".to_string(); REPORT_SLOTS + 1];
        entries[0] = "1".into();
        entries[2] = "2".into();
        entries[REPORT_SLOTS] = "3".into();
        let text = format!("[{}]", entries.join(", "));
        let report = LossReport::decode(text.as_bytes(), ReportFormat::Text).unwrap();
        let result = transfer.apply_report(&report);
        assert!(matches!(
            result,
            Err(Error::ImplausibleReport {
                entry: 0,
                fragment_count: 3
            })
        ));

        // 거부된 보고는 상태를 바꾸지 않음
        assert_eq!(transfer.pending_count(), 3);
    }

    #[test]
    fn test_inbound_assembly() {
        let data: Vec<u8> = (0..2050u32).map(|i| (i % 251) as u8).collect();
        let mut assembly = InboundTransfer::new(2050, 860).unwrap();
        assert_eq!(assembly.fragment_count(), 3);

        assert!(assembly.insert(2, &data[1720..]));
        assert!(assembly.insert(0, &data[..860]));
        assert_eq!(assembly.missing_ids(100), vec![2]);
        assert!(!assembly.is_complete());

        assert!(assembly.insert(1, &data[860..1720]));
        assert!(assembly.is_complete());
        assert_eq!(assembly.into_data().as_ref(), data.as_slice());
    }

    #[test]
    fn test_inbound_duplicate_is_noop() {
        let mut assembly = InboundTransfer::new(100, 40).unwrap();
        assert!(assembly.insert(1, &[7u8; 40]));
        let remaining = assembly.remaining();

        assert!(!assembly.insert(1, &[7u8; 40]));
        assert_eq!(assembly.remaining(), remaining);
        assert!(assembly.is_received(1));
        assert_eq!(assembly.missing_ids(10), vec![1, 3]);

        let data = assembly.into_data();
        assert!(data[40..80].iter().all(|&b| b == 7));
        assert!(data[..40].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_inbound_out_of_range_ignored() {
        let mut assembly = InboundTransfer::new(100, 40).unwrap();
        assert!(!assembly.insert(3, &[1u8; 40]));
        assert_eq!(assembly.remaining(), 3);
    }

    #[test]
    fn test_missing_ids_limit() {
        let assembly = InboundTransfer::new(250 * 10, 10).unwrap();
        let ids = assembly.missing_ids(100);
        assert_eq!(ids.len(), 100);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&100));
    }

    #[test]
    fn test_empty_inbound_is_complete() {
        let assembly = InboundTransfer::new(0, 860).unwrap();
        assert!(assembly.is_complete());
        assert!(assembly.loss_report(100).is_complete());
        assert!(assembly.into_data().is_empty());
    }
}
