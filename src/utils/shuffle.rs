use rand::Rng;

/// Fisher–Yates 洗牌：O(n)，每种排列概率相同 (前提是 rng 均匀)
pub fn fisher_yates_shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
