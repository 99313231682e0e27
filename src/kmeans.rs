use kmeans::{EuclideanDistance, KMeans, KMeansConfig, KMeansState};
use log::debug;

/// RGB 向量的维数
pub const DIMS: usize = 3;

fn imbalance_factor(hist: &[usize]) -> f32 {
    let (mut tot, mut uf) = (0.0, 0.0);
    for h in hist {
        let h = *h as f32;
        tot += h;
        uf += h.powf(2.0);
    }
    uf * hist.len() as f32 / tot.powf(2.0)
}

/// 使用 kmeans 对颜色聚类，返回聚类中心
///
/// 参数：
/// - x: 输入像素，长度为 n * 3
/// - nc: 聚类中心数量
/// - max_iter: 最大迭代次数
pub fn color_kmeans(x: &[f32], nc: usize, max_iter: usize) -> Vec<[f32; DIMS]> {
    assert!(x.len() % DIMS == 0, "x must be a multiple of 3");
    let n = x.len() / DIMS;
    assert!(nc > 0 && nc <= n, "nc must be in 1..={n}");

    let km: KMeans<_, 8, _> = KMeans::new(x, n, DIMS, EuclideanDistance);
    let init_done = |_s: &KMeansState<f32>| debug!("KMeans 初始化完成");
    let iteration_done = |s: &KMeansState<f32>, nr: usize, new_distsum: f32| {
        debug!(
            "第 {} 轮 - 不平衡度：{:.2} | 距离和变化：{:+.2}",
            nr,
            imbalance_factor(&s.centroid_frequency),
            new_distsum - s.distsum
        );
    };
    let conf = KMeansConfig::build().init_done(&init_done).iteration_done(&iteration_done).build();
    // NOTE: init_kmeanplusplus 会 panic，这里沿用随机划分初始化
    let result = km.kmeans_lloyd(nc, max_iter, KMeans::init_random_partition, &conf);

    // 中心点可能带有 SIMD 对齐的填充，按实际步长取前三个分量
    let centroids = result.centroids.to_vec();
    let stride = centroids.len() / nc;
    centroids.chunks(stride).map(|c| [c[0], c[1], c[2]]).collect()
}
