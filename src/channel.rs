//! 데이터그램 채널 추상화
//!
//! 엔진은 `send` 한 번, `recv(timeout)` 한 번씩만 수행한다. 타임아웃은
//! `Error::Timeout`으로 돌려주고, 재시도 여부는 엔진이 결정한다.
//!
//! - UdpChannel: 실제 UDP 소켓 (고정 상대 주소)
//! - MemoryChannel: 프로세스 내 양방향 큐 (테스트용)
//! - LossyChannel: 손실/절단/비트 손상을 주입하는 래퍼

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{Error, Result, MAX_DATAGRAM};

/// 신뢰할 수 없는 양방향 데이터그램 채널
#[allow(async_fn_in_trait)]
pub trait Channel {
    /// 데이터그램 하나 전송 (도착 보장 없음)
    async fn send(&mut self, datagram: &[u8]) -> Result<()>;

    /// 데이터그램 하나 수신. `timeout` 동안 아무것도 없으면 `Error::Timeout`
    async fn recv(&mut self, timeout: Duration) -> Result<Bytes>;
}

/// UDP 채널
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
    buf: Vec<u8>,
}

impl UdpChannel {
    /// `local_addr`에 바인딩하고 `peer`로 송신하는 채널 생성
    pub async fn bind(local_addr: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        Ok(Self {
            socket,
            peer,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// 실제 바인딩 주소 (포트 0 바인딩 시 OS 할당 포트 포함)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = peer;
    }
}

impl Channel for UdpChannel {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.socket.send_to(datagram, self.peer).await?;
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Bytes> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((len, _addr))) => Ok(Bytes::copy_from_slice(&self.buf[..len])),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::Timeout),
        }
    }
}

/// 프로세스 내 채널 (한 쌍으로 생성)
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryChannel {
    /// 서로 연결된 두 끝점 생성
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

impl Channel for MemoryChannel {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| Error::ChannelClosed)
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Bytes> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(datagram)) => Ok(datagram),
            Ok(None) => Err(Error::ChannelClosed),
            Err(_) => Err(Error::Timeout),
        }
    }
}

/// 장애 주입 모델
///
/// 모든 확률은 `[0.0, 1.0]` 범위. 기본값은 장애 없음.
#[derive(Debug, Clone, Default)]
pub struct FaultModel {
    /// 데이터그램 손실 확률
    pub loss_rate: f64,

    /// 데이터그램 절단 확률 (임의 길이로 자름)
    pub truncate_rate: f64,

    /// 임의 비트 1개 반전 확률
    pub corrupt_rate: f64,

    /// 재현 가능한 RNG 시드
    pub seed: Option<u64>,
}

impl FaultModel {
    /// 손실만 있는 모델
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// 주입된 장애 카운터
#[derive(Debug, Clone, Default)]
pub struct FaultStats {
    pub passed: u64,
    pub dropped: u64,
    pub truncated: u64,
    pub corrupted: u64,
}

/// 결정적 손실 필터. true를 반환하면 해당 데이터그램을 버린다
pub type DropFilter = Box<dyn FnMut(&[u8]) -> bool + Send>;

/// 송신 방향에 장애를 주입하는 채널 래퍼
pub struct LossyChannel<C> {
    inner: C,
    model: FaultModel,
    rng: StdRng,
    filter: Option<DropFilter>,
    stats: FaultStats,
}

impl<C: Channel> LossyChannel<C> {
    pub fn new(inner: C, model: FaultModel) -> Self {
        let rng = match model.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner,
            model,
            rng,
            filter: None,
            stats: FaultStats::default(),
        }
    }

    /// 결정적 손실 필터 추가 (확률 모델보다 먼저 적용)
    pub fn with_drop_filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn fault_stats(&self) -> &FaultStats {
        &self.stats
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn roll(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.rng.gen_bool(probability.min(1.0))
    }
}

impl<C: Channel> Channel for LossyChannel<C> {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        if let Some(filter) = self.filter.as_mut() {
            if filter(datagram) {
                self.stats.dropped += 1;
                trace!("필터로 데이터그램 폐기: {} bytes", datagram.len());
                return Ok(());
            }
        }

        if self.roll(self.model.loss_rate) {
            self.stats.dropped += 1;
            return Ok(());
        }

        let mut bytes = datagram.to_vec();

        if !bytes.is_empty() && self.roll(self.model.truncate_rate) {
            let len = self.rng.gen_range(0..bytes.len());
            bytes.truncate(len);
            self.stats.truncated += 1;
        }

        if !bytes.is_empty() && self.roll(self.model.corrupt_rate) {
            let bit = self.rng.gen_range(0..bytes.len() * 8);
            bytes[bit / 8] ^= 1 << (bit % 8);
            self.stats.corrupted += 1;
        }

        self.stats.passed += 1;
        self.inner.send(&bytes).await
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Bytes> {
        self.inner.recv(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_memory_pair() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send(b"ping").await.unwrap();
        assert_eq!(b.recv(WAIT).await.unwrap().as_ref(), b"ping");

        b.send(b"pong").await.unwrap();
        assert_eq!(a.recv(WAIT).await.unwrap().as_ref(), b"pong");
    }

    #[tokio::test]
    async fn test_memory_timeout_and_close() {
        let (mut a, b) = MemoryChannel::pair();
        assert!(matches!(a.recv(WAIT).await, Err(Error::Timeout)));

        drop(b);
        assert!(matches!(a.recv(WAIT).await, Err(Error::ChannelClosed)));
        assert!(matches!(a.send(b"x").await, Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_lossy_drop_filter() {
        let (a, mut b) = MemoryChannel::pair();
        let mut a = LossyChannel::new(a, FaultModel::default())
            .with_drop_filter(|datagram: &[u8]| datagram.first() == Some(&0xFF));

        a.send(&[0xFF, 1]).await.unwrap();
        a.send(&[0x01, 2]).await.unwrap();

        assert_eq!(b.recv(WAIT).await.unwrap().as_ref(), &[0x01, 2]);
        assert!(matches!(b.recv(WAIT).await, Err(Error::Timeout)));
        assert_eq!(a.fault_stats().dropped, 1);
        assert_eq!(a.fault_stats().passed, 1);
    }

    #[tokio::test]
    async fn test_lossy_full_loss_and_corruption() {
        let (a, mut b) = MemoryChannel::pair();
        let mut lossy = LossyChannel::new(a, FaultModel::lossy(1.0).with_seed(7));
        for _ in 0..10 {
            lossy.send(b"gone").await.unwrap();
        }
        assert!(matches!(b.recv(WAIT).await, Err(Error::Timeout)));
        assert_eq!(lossy.fault_stats().dropped, 10);

        let model = FaultModel {
            corrupt_rate: 1.0,
            seed: Some(7),
            ..FaultModel::default()
        };
        let mut corrupting = LossyChannel::new(lossy.into_inner(), model);
        let original = [0u8; 16];
        corrupting.send(&original).await.unwrap();
        let received = b.recv(WAIT).await.unwrap();
        assert_eq!(received.len(), 16);
        let flipped: u32 = received.iter().map(|b| b.count_ones()).sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn test_udp_loopback() {
        let any = "127.0.0.1:0".parse().unwrap();
        let mut a = UdpChannel::bind(any, any).await.unwrap();
        let mut b = UdpChannel::bind(any, a.local_addr().unwrap()).await.unwrap();
        a.set_peer(b.local_addr().unwrap());

        a.send(b"over udp").await.unwrap();
        assert_eq!(b.recv(Duration::from_secs(2)).await.unwrap().as_ref(), b"over udp");
        assert!(matches!(
            a.recv(Duration::from_millis(20)).await,
            Err(Error::Timeout)
        ));
    }
}
