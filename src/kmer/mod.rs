//! K-mer primitives: nucleotide codes, bit-packed k-mers, and the odd-k
//! dispatch used to turn the runtime `k` parameter into compile-time
//! specialisations.

pub mod dna;
mod packed;

pub use dna::{Base, EdgeEncoding, Side};
pub use packed::Kmer;

/// Largest supported vertex k-mer length (odd; edges use k + 1 bases).
pub const MAX_K: usize = 63;

/// Whether `k` is a valid vertex k-mer length.
pub fn valid_k(k: usize) -> bool {
    k % 2 == 1 && (1..=MAX_K).contains(&k)
}

/// Dispatch a generic function over the compile-time `(K, K + 1)` pair for a
/// runtime odd `k`.
///
/// The callee must be generic over two const parameters, the vertex length
/// and the edge length, and return `anyhow::Result<_>`:
///
/// ```ignore
/// fn run<const K: usize, const KP1: usize>(cfg: &Config) -> anyhow::Result<Summary> { .. }
/// let summary = dispatch_odd_k!(k, run(&cfg))?;
/// ```
#[macro_export]
macro_rules! dispatch_odd_k {
    ($k:expr, $callback:ident($($args:expr),* $(,)?)) => {{
        match $k {
            1 => $callback::<1, 2>($($args),*),
            3 => $callback::<3, 4>($($args),*),
            5 => $callback::<5, 6>($($args),*),
            7 => $callback::<7, 8>($($args),*),
            9 => $callback::<9, 10>($($args),*),
            11 => $callback::<11, 12>($($args),*),
            13 => $callback::<13, 14>($($args),*),
            15 => $callback::<15, 16>($($args),*),
            17 => $callback::<17, 18>($($args),*),
            19 => $callback::<19, 20>($($args),*),
            21 => $callback::<21, 22>($($args),*),
            23 => $callback::<23, 24>($($args),*),
            25 => $callback::<25, 26>($($args),*),
            27 => $callback::<27, 28>($($args),*),
            29 => $callback::<29, 30>($($args),*),
            31 => $callback::<31, 32>($($args),*),
            33 => $callback::<33, 34>($($args),*),
            35 => $callback::<35, 36>($($args),*),
            37 => $callback::<37, 38>($($args),*),
            39 => $callback::<39, 40>($($args),*),
            41 => $callback::<41, 42>($($args),*),
            43 => $callback::<43, 44>($($args),*),
            45 => $callback::<45, 46>($($args),*),
            47 => $callback::<47, 48>($($args),*),
            49 => $callback::<49, 50>($($args),*),
            51 => $callback::<51, 52>($($args),*),
            53 => $callback::<53, 54>($($args),*),
            55 => $callback::<55, 56>($($args),*),
            57 => $callback::<57, 58>($($args),*),
            59 => $callback::<59, 60>($($args),*),
            61 => $callback::<61, 62>($($args),*),
            63 => $callback::<63, 64>($($args),*),
            other => Err(::anyhow::anyhow!(
                "k must be odd and in [1, {}]; got {}",
                $crate::kmer::MAX_K,
                other
            )),
        }
    }};
}
