//! 송신자
//!
//! 라운드 단위로 동작한다:
//! 1. Transmitting: 미확인 조각을 오름차순으로 전송한 뒤 SUMMARY 프레임 전송
//! 2. Draining: 손실 보고 대기. 보고된 조각만 다음 라운드 대상으로 남김
//!
//! 타임아웃이나 검증 실패 보고는 "진전 없는 라운드"로 세고 같은 집합을 재전송한다.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::frame::FrameCodec;
use crate::report::LossReport;
use crate::stats::TransferStats;
use crate::transfer::OutboundTransfer;
use crate::{Config, Error, Result};

/// 송신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Transmitting,
    Draining,
}

/// 송신자
pub struct Sender<C> {
    /// 설정
    config: Config,

    codec: FrameCodec,

    channel: C,

    /// 전송 통계 (외부 모니터링용 읽기 핸들 공유)
    stats: Arc<RwLock<TransferStats>>,
}

impl<C: Channel> Sender<C> {
    /// 새 송신자 생성
    pub fn new(config: Config, channel: C) -> Result<Self> {
        config.validate()?;
        let codec = FrameCodec::new(config.frame_size)?;

        Ok(Self {
            config,
            codec,
            channel,
            stats: Arc::new(RwLock::new(TransferStats::new())),
        })
    }

    /// 버퍼 전체를 전달. 수신측이 빈 손실 보고를 보낼 때까지 라운드 반복
    pub async fn transfer(&mut self, buffer: Bytes) -> Result<()> {
        let mut transfer = OutboundTransfer::new(buffer, self.codec.payload_size())?;
        self.discard_stale().await?;

        {
            let mut stats = self.stats.write();
            *stats = TransferStats::new();
            stats.total_bytes = transfer.total_size() as u64;
            stats.total_fragments = transfer.fragment_count() as u64;
        }

        info!(
            "전송 시작: {} bytes, {} fragments (frame {} bytes)",
            transfer.total_size(),
            transfer.fragment_count(),
            self.codec.frame_size()
        );

        let mut state = SenderState::Transmitting;
        let mut round: u64 = 0;
        let mut idle_rounds: u32 = 0;

        loop {
            match state {
                SenderState::Transmitting => {
                    round += 1;
                    self.transmit_round(&transfer, round).await?;
                    state = SenderState::Draining;
                }
                SenderState::Draining => {
                    match self.await_report().await? {
                        Some(report) => {
                            transfer.apply_report(&report)?;
                            idle_rounds = 0;

                            if transfer.is_acknowledged() {
                                info!("전송 완료: {}", self.stats.read().summary());
                                return Ok(());
                            }

                            debug!(
                                "라운드 {}: {} fragments 누락 보고",
                                round,
                                transfer.pending_count()
                            );
                        }
                        None => {
                            idle_rounds += 1;
                            if idle_rounds > self.config.max_idle_rounds {
                                warn!("{} 라운드 연속 진전 없음, 전송 중단", idle_rounds);
                                return Err(Error::RoundsExhausted {
                                    rounds: idle_rounds,
                                });
                            }
                        }
                    }
                    state = SenderState::Transmitting;
                }
            }
        }
    }

    /// 이전 전송에서 늦게 도착한 보고 폐기
    ///
    /// 지난 타임아웃 뒤에 도착한 "모두 수신" 보고를 새 버퍼의 완료로 오인하지 않도록
    /// 첫 라운드 전에 대기 중인 데이터그램을 모두 비운다.
    async fn discard_stale(&mut self) -> Result<()> {
        let mut discarded: u32 = 0;
        loop {
            match self.channel.recv(Duration::ZERO).await {
                Ok(_) => discarded += 1,
                Err(Error::Timeout) | Err(Error::ChannelClosed) => break,
                Err(e) => return Err(e),
            }
        }
        if discarded > 0 {
            debug!("이전 전송의 데이터그램 {}개 폐기", discarded);
        }
        Ok(())
    }

    /// 미확인 조각 전체 + SUMMARY 전송
    async fn transmit_round(&mut self, transfer: &OutboundTransfer, round: u64) -> Result<()> {
        let pending: Vec<u32> = transfer.pending().collect();

        for index in pending {
            let Some((remaining, payload)) = transfer.fragment(index) else {
                continue;
            };
            let frame = self.codec.data(index, remaining, payload)?;
            self.channel.send(&frame).await?;

            let mut stats = self.stats.write();
            stats.data_frames += 1;
            if round > 1 {
                stats.retransmitted_frames += 1;
            }
        }

        let summary = self.codec.summary(transfer.total_size())?;
        self.channel.send(&summary).await?;

        let mut stats = self.stats.write();
        stats.summary_frames += 1;
        stats.rounds = round;
        Ok(())
    }

    /// 손실 보고 대기. 타임아웃이나 검증 실패는 None
    async fn await_report(&mut self) -> Result<Option<LossReport>> {
        let datagram = match self.channel.recv(self.config.timeout()).await {
            Ok(datagram) => datagram,
            Err(Error::Timeout) => {
                self.stats.write().timeouts += 1;
                debug!("손실 보고 타임아웃, 라운드 재시도");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match LossReport::decode(&datagram, self.config.report_format) {
            Ok(report) => {
                self.stats.write().reports += 1;
                Ok(Some(report))
            }
            Err(e) => {
                self.stats.write().rejected_reports += 1;
                warn!("손실 보고 폐기: {}", e);
                Ok(None)
            }
        }
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
