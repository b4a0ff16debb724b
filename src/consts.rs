//! Mathematical constants

/// 0.5 ln(2π)
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;
/// √3, scale of the Matérn 3/2 distance
pub const SQRT_3: f64 = 1.732_050_807_568_877_2;
/// √5, scale of the Matérn 5/2 distance
pub const SQRT_5: f64 = 2.236_067_977_499_789_8;
