use super::biquad::{check_range, BiquadCoeffs, BiquadFilter};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Persistent worker pool for channel-parallel biquad filtering.
///
/// `[c0, c_lim)` is cut into contiguous, near-equal pieces. All but the last
/// piece go to pool workers; the calling thread filters the last one. Each
/// piece is written to its own scratch buffer and scattered back into the
/// block once every worker has joined, so output matches the sequential
/// `BiquadFilter::apply` bit for bit.
pub struct FilterPool {
    pool: Option<ThreadPool>,
    n_pieces: usize,
    scratch: Vec<Vec<i16>>,
}

impl FilterPool {
    pub fn new(n_threads: usize) -> Self {
        let n_pieces = n_threads.max(1);
        let pool = if n_pieces > 1 {
            match ThreadPoolBuilder::new()
                .num_threads(n_pieces - 1)
                .thread_name(|i| format!("biquad-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("filter pool unavailable, filtering inline: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            n_pieces: if pool.is_some() { n_pieces } else { 1 },
            pool,
            scratch: vec![Vec::new(); n_pieces],
        }
    }

    pub fn threads(&self) -> usize {
        self.n_pieces
    }

    pub fn apply(
        &mut self,
        filter: &mut BiquadFilter,
        block: &mut [i16],
        max_int: i32,
        ntpts: usize,
        stride: usize,
        c0: usize,
        c_lim: usize,
    ) {
        let width = c_lim.saturating_sub(c0);
        let n_pieces = self.n_pieces.min(width);
        let pool = match &self.pool {
            Some(pool) if n_pieces > 1 => pool,
            _ => return filter.apply(block, max_int, ntpts, stride, c0, c_lim),
        };
        check_range(
            block.len(),
            ntpts,
            stride,
            c0,
            c_lim,
            filter.channel_count(),
        );

        let piece = |i: usize| (c0 + i * width / n_pieces, c0 + (i + 1) * width / n_pieces);
        for (i, buf) in self.scratch.iter_mut().take(n_pieces).enumerate() {
            let (lo, hi) = piece(i);
            buf.resize(ntpts * (hi - lo), 0);
        }

        let (coeffs, state) = filter.state_and_coeffs(c0, c_lim);
        let src: &[i16] = block;
        let scratch = &mut self.scratch[..n_pieces];

        pool.in_place_scope(|s| {
            let mut rest = state;
            let mut last = None;
            for (i, out) in scratch.iter_mut().enumerate() {
                let (lo, hi) = piece(i);
                let (mine, tail) = std::mem::take(&mut rest).split_at_mut(hi - lo);
                rest = tail;
                if i + 1 == n_pieces {
                    last = Some((mine, out, lo));
                } else {
                    s.spawn(move |_| filter_piece(coeffs, mine, src, out, max_int, ntpts, stride, lo));
                }
            }
            if let Some((mine, out, lo)) = last {
                filter_piece(coeffs, mine, src, out, max_int, ntpts, stride, lo);
            }
        });

        for (i, buf) in self.scratch.iter().take(n_pieces).enumerate() {
            let (lo, hi) = piece(i);
            let w = hi - lo;
            for (row, filtered) in block
                .chunks_exact_mut(stride)
                .take(ntpts)
                .zip(buf.chunks_exact(w))
            {
                row[lo..hi].copy_from_slice(filtered);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn filter_piece(
    coeffs: BiquadCoeffs,
    state: &mut [[f64; 2]],
    src: &[i16],
    out: &mut [i16],
    max_int: i32,
    ntpts: usize,
    stride: usize,
    lo: usize,
) {
    let w = state.len();
    for (row, dst) in src
        .chunks_exact(stride)
        .take(ntpts)
        .zip(out.chunks_exact_mut(w))
    {
        for ((z, &x), y) in state.iter_mut().zip(&row[lo..lo + w]).zip(dst.iter_mut()) {
            *y = coeffs.step_raw(z, x, max_int);
        }
    }
}
