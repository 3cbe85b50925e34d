//! 수신자
//!
//! - AwaitingFirstFrame: 첫 유효 프레임에서 전체 크기 확정 후 조립 상태 할당
//! - Collecting: DATA 조립, SUMMARY마다 손실 보고 회신
//! - Done: 완료 보고로 재요청에 응답한 뒤 조립된 버퍼를 한 번만 반환
//!
//! 길이나 체크섬이 맞지 않는 프레임은 손실과 동일하게 취급한다.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::frame::{Frame, FrameCodec, FrameKind};
use crate::report::LossReport;
use crate::stats::TransferStats;
use crate::transfer::InboundTransfer;
use crate::{Config, Error, Result};

/// 수신 상태
#[derive(Debug)]
enum ReceiverState {
    AwaitingFirstFrame,
    Collecting(InboundTransfer),
    Done(InboundTransfer),
}

/// 수신자
pub struct Receiver<C> {
    config: Config,

    codec: FrameCodec,

    channel: C,

    /// 보고 하나에 담을 최대 누락 ID 수
    report_capacity: usize,

    stats: Arc<RwLock<TransferStats>>,
}

impl<C: Channel> Receiver<C> {
    /// 새 수신자 생성
    pub fn new(config: Config, channel: C) -> Result<Self> {
        config.validate()?;
        let codec = FrameCodec::new(config.frame_size)?;
        let report_capacity = LossReport::capacity(config.report_format, config.frame_size);

        Ok(Self {
            config,
            codec,
            channel,
            report_capacity,
            stats: Arc::new(RwLock::new(TransferStats::new())),
        })
    }

    /// 버퍼 하나를 완전히 수신
    ///
    /// 부분 조립된 버퍼는 반환하지 않는다. 완료 전에 연속 타임아웃이
    /// `max_idle_rounds`를 넘으면 실패.
    pub async fn receive(&mut self) -> Result<Bytes> {
        *self.stats.write() = TransferStats::new();

        let mut state = ReceiverState::AwaitingFirstFrame;
        let mut idle_rounds: u32 = 0;

        loop {
            state = match state {
                ReceiverState::AwaitingFirstFrame => match self.next_frame(&mut idle_rounds).await? {
                    Some(frame) => match self.resolve(&frame) {
                        Some(assembly) => self.collect(assembly, frame).await?,
                        None => ReceiverState::AwaitingFirstFrame,
                    },
                    None => ReceiverState::AwaitingFirstFrame,
                },
                ReceiverState::Collecting(assembly) => match self.next_frame(&mut idle_rounds).await? {
                    Some(frame) => self.collect(assembly, frame).await?,
                    None => ReceiverState::Collecting(assembly),
                },
                ReceiverState::Done(assembly) => {
                    self.linger().await?;
                    info!("수신 완료: {}", self.stats.read().summary());
                    return Ok(assembly.into_data());
                }
            };
        }
    }

    /// 다음 유효 프레임. 타임아웃이나 손상 프레임은 None
    async fn next_frame(&mut self, idle_rounds: &mut u32) -> Result<Option<Frame>> {
        let datagram = match self.channel.recv(self.config.timeout()).await {
            Ok(datagram) => datagram,
            Err(Error::Timeout) => {
                *idle_rounds += 1;
                self.stats.write().timeouts += 1;
                if *idle_rounds > self.config.max_idle_rounds {
                    warn!("{}회 연속 타임아웃, 수신 중단", idle_rounds);
                    return Err(Error::RoundsExhausted {
                        rounds: *idle_rounds,
                    });
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match self.codec.decode(&datagram) {
            Ok(frame) => {
                *idle_rounds = 0;
                Ok(Some(frame))
            }
            Err(e) => {
                self.stats.write().rejected_frames += 1;
                debug!("프레임 폐기: {}", e);
                Ok(None)
            }
        }
    }

    /// 첫 유효 프레임에서 전체 크기 확정
    ///
    /// DATA: `index * P + remaining`, SUMMARY: `remaining`
    fn resolve(&self, frame: &Frame) -> Option<InboundTransfer> {
        if frame.kind == FrameKind::Data && frame.remaining == 0 {
            self.stats.write().rejected_frames += 1;
            return None;
        }

        let total = frame.implied_total(self.codec.payload_size());
        match InboundTransfer::new(total, self.codec.payload_size()) {
            Ok(assembly) => {
                info!(
                    "전송 크기 확정: {} bytes, {} fragments",
                    assembly.total_size(),
                    assembly.fragment_count()
                );
                let mut stats = self.stats.write();
                stats.total_bytes = assembly.total_size() as u64;
                stats.total_fragments = assembly.fragment_count() as u64;
                Some(assembly)
            }
            Err(e) => {
                warn!("첫 프레임 폐기: {}", e);
                self.stats.write().rejected_frames += 1;
                None
            }
        }
    }

    /// 프레임 하나를 조립 상태에 반영
    async fn collect(&mut self, mut assembly: InboundTransfer, frame: Frame) -> Result<ReceiverState> {
        let total = frame.implied_total(self.codec.payload_size());
        if total != assembly.total_size() as u64 || (frame.kind == FrameKind::Data && frame.remaining == 0) {
            warn!(
                "크기 불일치 프레임 폐기: kind={:?}, index={}, implied={}, resolved={}",
                frame.kind,
                frame.index,
                total,
                assembly.total_size()
            );
            self.stats.write().rejected_frames += 1;
            return Ok(ReceiverState::Collecting(assembly));
        }

        match frame.kind {
            FrameKind::Data => {
                let inserted = assembly.insert(frame.index, frame.data());
                let mut stats = self.stats.write();
                if inserted {
                    stats.data_frames += 1;
                } else {
                    stats.duplicate_frames += 1;
                }
            }
            FrameKind::Summary => {
                self.stats.write().summary_frames += 1;
                let report = assembly.loss_report(self.report_capacity);
                debug!(
                    "손실 보고 전송: {} missing (남은 조각 {})",
                    report.len(),
                    assembly.remaining()
                );
                self.send_report(&report).await?;
            }
        }

        if assembly.is_complete() {
            Ok(ReceiverState::Done(assembly))
        } else {
            Ok(ReceiverState::Collecting(assembly))
        }
    }

    /// 완료 후 송신측 재요청에 "모두 수신" 보고로 응답
    ///
    /// 송신측의 마지막 보고가 유실된 경우를 흡수한다. 응답 횟수가 `linger_rounds`에
    /// 도달하거나 대기 중 타임아웃이 나면 종료.
    async fn linger(&mut self) -> Result<()> {
        let complete = LossReport::complete();
        let mut replies: u32 = 0;

        while replies < self.config.linger_rounds.max(1) {
            match self.channel.recv(self.config.linger_timeout()).await {
                Ok(datagram) => {
                    if let Ok(frame) = self.codec.decode(&datagram) {
                        if frame.kind == FrameKind::Summary {
                            self.stats.write().summary_frames += 1;
                            self.send_report(&complete).await?;
                            replies += 1;
                        }
                    }
                }
                Err(Error::Timeout) | Err(Error::ChannelClosed) => break,
                Err(e) => return Err(e),
            }
        }

        debug!("완료 응답 {}회 후 종료", replies);
        Ok(())
    }

    async fn send_report(&mut self, report: &LossReport) -> Result<()> {
        let bytes = report.encode(self.config.report_format)?;
        self.channel.send(&bytes).await?;
        self.stats.write().reports += 1;
        Ok(())
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }

    /// 통계 읽기 핸들 (진행 상황 출력용)
    pub fn stats_handle(&self) -> Arc<RwLock<TransferStats>> {
        self.stats.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_channel(self) -> C {
        self.channel
    }
}
