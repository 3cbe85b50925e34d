//! 바이트 단위 Fletcher-32 체크섬
//!
//! 두 누산기를 65535로 나눈 나머지로 유지한다. 360바이트 블록마다 한 번씩만
//! 나머지 연산을 해도 `u32` 누산기가 넘치지 않는다.

/// 모듈러스
const MODULUS: u32 = 65535;

/// 나머지 연산 없이 누적 가능한 최대 블록 크기
const BLOCK_SIZE: usize = 360;

/// Fletcher-32 계산 (`c1 << 16 | c0`)
pub fn fletcher32(data: &[u8]) -> u32 {
    let mut c0: u32 = 0;
    let mut c1: u32 = 0;

    for block in data.chunks(BLOCK_SIZE) {
        for &byte in block {
            c0 += byte as u32;
            c1 += c0;
        }
        c0 %= MODULUS;
        c1 %= MODULUS;
    }

    (c1 << 16) | c0
}
