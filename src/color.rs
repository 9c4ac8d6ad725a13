use colorous::{Color, Gradient};

pub fn pack_rgba8(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Perceptually uniform continuous scales, by plotly-style name.
pub fn gradient_named(name: &str) -> Option<Gradient> {
    match name.to_ascii_lowercase().as_str() {
        "viridis" => Some(colorous::VIRIDIS),
        "plasma" => Some(colorous::PLASMA),
        "inferno" => Some(colorous::INFERNO),
        "magma" => Some(colorous::MAGMA),
        "cividis" => Some(colorous::CIVIDIS),
        "turbo" => Some(colorous::TURBO),
        _ => None,
    }
}

/// Min/max over the finite entries of `values`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub fn of(values: &[f32]) -> Option<Self> {
        values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(r) => Some(Self {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })
    }
}

pub fn gradient_map(values: &[f32], range: ValueRange, grad: &Gradient) -> Vec<u32> {
    let den = (range.max - range.min).max(1e-12);
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return pack_rgba8(128, 128, 128, 0);
            }
            let t = ((v - range.min) / den).clamp(0.0, 1.0);
            let c: Color = grad.eval_continuous(t as f64);
            pack_rgba8(c.r, c.g, c.b, 255)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack_rgba8(c: u32) -> [u8; 4] {
        c.to_le_bytes()
    }

    #[test]
    fn range_skips_non_finite() {
        let r = ValueRange::of(&[f32::NAN, 2.0, -1.0, f32::INFINITY, 0.5]).unwrap();
        assert_eq!(r, ValueRange { min: -1.0, max: 2.0 });
        assert!(ValueRange::of(&[]).is_none());
        assert!(ValueRange::of(&[f32::NAN]).is_none());
    }

    #[test]
    fn gradient_endpoints_follow_range() {
        let grad = gradient_named("Viridis").unwrap();
        let colors = gradient_map(&[10.0, 20.0, f32::NAN], ValueRange { min: 10.0, max: 20.0 }, &grad);
        let lo = colorous::VIRIDIS.eval_continuous(0.0);
        let hi = colorous::VIRIDIS.eval_continuous(1.0);
        assert_eq!(unpack_rgba8(colors[0]), [lo.r, lo.g, lo.b, 255]);
        assert_eq!(unpack_rgba8(colors[1]), [hi.r, hi.g, hi.b, 255]);
        assert_eq!(unpack_rgba8(colors[2])[3], 0);
    }

    #[test]
    fn flat_range_maps_to_low_end() {
        let grad = colorous::VIRIDIS;
        let colors = gradient_map(&[3.0, 3.0], ValueRange { min: 3.0, max: 3.0 }, &grad);
        assert_eq!(colors[0], colors[1]);
        let lo = grad.eval_continuous(0.0);
        assert_eq!(unpack_rgba8(colors[0]), [lo.r, lo.g, lo.b, 255]);
    }

    #[test]
    fn unknown_scale_is_none() {
        assert!(gradient_named("jet").is_none());
    }
}
