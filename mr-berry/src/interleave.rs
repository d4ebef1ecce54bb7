//! 奇偶抽样增广.

use ndarray::{s, Array2};

/// 按行列奇偶性把一张 2D 切片拆成四张子图, 次序为:
/// 偶行偶列, 奇行奇列, 偶行奇列, 奇行偶列.
///
/// 纯函数, 无副作用. 行列数均为偶数时四张子图形状一致,
/// 且按奇偶性可以无损拼回原图.
pub fn interleave_plane<T: Clone>(plane: &Array2<T>) -> [Array2<T>; 4] {
    [
        plane.slice(s![..;2, ..;2]).to_owned(),
        plane.slice(s![1..;2, 1..;2]).to_owned(),
        plane.slice(s![..;2, 1..;2]).to_owned(),
        plane.slice(s![1..;2, ..;2]).to_owned(),
    ]
}

/// 增广资格: 两个空间维度都不小于 `2 * crop_size` 的切片
/// 才值得做奇偶抽样.
#[inline]
pub fn plane_eligible<T>(plane: &Array2<T>, crop_size: usize) -> bool {
    plane.nrows() >= 2 * crop_size && plane.ncols() >= 2 * crop_size
}
