//! Soundness of the real bounds
//!
//! Inputs are dyadic so that every sampled point is exactly representable;
//! the sampled result is computed in the real format with both directed
//! roundings and must overlap the bound of the zonotope.

use std::cmp::Ordering;

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use zonofloat::context::AnalysisContext;
use zonofloat::domain::Zonotope;
use zonofloat::numerics::{arith, from_f64, BuiltFloat, FloatFormat, RoundingConfig};

const SAMPLES: usize = 32;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

/// Exact-or-enclosed value of `f` at real-format arguments: `[down, up]`
fn enclose_point(f: impl Fn(&mut RoundingConfig) -> BuiltFloat) -> (BuiltFloat, BuiltFloat) {
    (f(&mut RoundingConfig::downward()), f(&mut RoundingConfig::upward()))
}

fn real(x: f64) -> BuiltFloat {
    from_f64(x, FloatFormat::REAL, &mut RoundingConfig::nearest())
}

fn overlaps(z: &Zonotope, (lo, hi): &(BuiltFloat, BuiltFloat)) -> bool {
    lo.compare(z.real_max()) != Some(Ordering::Greater)
        && z.real_min().compare(hi) != Some(Ordering::Greater)
}

/// `nominal + t·tolerance/2` with `t` a multiple of 1/1024 in [-1, 1]
fn sample(rng: &mut ChaCha8Rng, nominal: f64, tolerance: f64) -> f64 {
    let t = rng.gen_range(-1024i32..=1024) as f64 / 1024.0;
    nominal + t * tolerance / 2.0
}

fn dyadic(range: std::ops::RangeInclusive<i32>, scale: f64) -> impl Strategy<Value = f64> {
    range.prop_map(move |k| k as f64 / scale)
}

fn check_binary(op: Op, a: (f64, f64), b: (f64, f64), seed: u64) -> Result<(), TestCaseError> {
    let mut ctx = AnalysisContext::default();
    let x = Zonotope::input_f64(&mut ctx, a.0, a.1, FloatFormat::DOUBLE);
    let y = Zonotope::input_f64(&mut ctx, b.0, b.1, FloatFormat::DOUBLE);
    let z = match op {
        Op::Add => x.add(&mut ctx, &y),
        Op::Sub => x.sub(&mut ctx, &y),
        Op::Mul => x.mul(&mut ctx, &y),
        Op::Div => x.div(&mut ctx, &y),
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..SAMPLES {
        let (sa, sb) = (real(sample(&mut rng, a.0, a.1)), real(sample(&mut rng, b.0, b.1)));
        if matches!(op, Op::Div) && sb.is_zero() {
            continue;
        }
        let point = enclose_point(|cfg| match op {
            Op::Add => arith::add(&sa, &sb, cfg),
            Op::Sub => arith::sub(&sa, &sb, cfg),
            Op::Mul => arith::mul(&sa, &sb, cfg),
            Op::Div => arith::div(&sa, &sb, cfg),
        });
        prop_assert!(
            overlaps(&z, &point),
            "{:?} of {} and {} at ({}, {}) escapes {}",
            op,
            x,
            y,
            sa,
            sb,
            z
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_add_is_sound(
        na in dyadic(-1024..=1024, 16.0), ta in dyadic(0..=64, 8.0),
        nb in dyadic(-1024..=1024, 16.0), tb in dyadic(0..=64, 8.0),
        seed in any::<u64>(),
    ) {
        check_binary(Op::Add, (na, ta), (nb, tb), seed)?;
    }

    #[test]
    fn prop_sub_is_sound(
        na in dyadic(-1024..=1024, 16.0), ta in dyadic(0..=64, 8.0),
        nb in dyadic(-1024..=1024, 16.0), tb in dyadic(0..=64, 8.0),
        seed in any::<u64>(),
    ) {
        check_binary(Op::Sub, (na, ta), (nb, tb), seed)?;
    }

    #[test]
    fn prop_mul_is_sound(
        na in dyadic(-1024..=1024, 16.0), ta in dyadic(0..=64, 8.0),
        nb in dyadic(-1024..=1024, 16.0), tb in dyadic(0..=64, 8.0),
        seed in any::<u64>(),
    ) {
        check_binary(Op::Mul, (na, ta), (nb, tb), seed)?;
    }

    #[test]
    fn prop_div_is_sound(
        na in dyadic(-1024..=1024, 16.0), ta in dyadic(0..=64, 8.0),
        nb in dyadic(-1024..=1024, 16.0), tb in dyadic(0..=64, 8.0),
        seed in any::<u64>(),
    ) {
        check_binary(Op::Div, (na, ta), (nb, tb), seed)?;
    }

    #[test]
    fn prop_sqrt_is_sound(
        n in dyadic(0..=1024, 16.0), t in dyadic(0..=64, 8.0),
        seed in any::<u64>(),
    ) {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, n, t, FloatFormat::DOUBLE);
        let root = x.sqrt(&mut ctx);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..SAMPLES {
            let s = sample(&mut rng, n, t);
            if s < 0.0 {
                continue;
            }
            let s = real(s);
            let point = enclose_point(|cfg| arith::sqrt(&s, cfg));
            prop_assert!(overlaps(&root, &point), "sqrt at {} escapes {}", s, root);
        }
    }

    #[test]
    fn prop_correlated_polynomial_is_sound(
        n in dyadic(-256..=256, 16.0), t in dyadic(0..=32, 8.0),
        seed in any::<u64>(),
    ) {
        // x·x − x uses the same input twice
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, n, t, FloatFormat::DOUBLE);
        let square = x.mul(&mut ctx, &x);
        let z = square.sub(&mut ctx, &x);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..SAMPLES {
            let s = real(sample(&mut rng, n, t));
            let point = enclose_point(|cfg| {
                let sq = arith::mul(&s, &s, cfg);
                arith::sub(&sq, &s, cfg)
            });
            prop_assert!(overlaps(&z, &point), "x*x - x at {} escapes {}", s, z);
        }
    }

    #[test]
    fn prop_merge_widens_monotonically(
        na in dyadic(-1024..=1024, 16.0), ta in dyadic(0..=64, 8.0),
        nb in dyadic(-1024..=1024, 16.0), tb in dyadic(0..=64, 8.0),
    ) {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, na, ta, FloatFormat::DOUBLE);
        let y = Zonotope::input_f64(&mut ctx, nb, tb, FloatFormat::DOUBLE);
        let joined = x.merge_with(&mut ctx, &y);
        prop_assert_eq!(joined.implementation(), x.implementation());
        for bound in [x.real_min(), x.real_max(), y.real_min(), y.real_max()] {
            prop_assert!(joined.may_be(bound), "{} not in {}", bound, joined);
        }
    }
}

#[test]
fn test_long_sum_stays_sound() {
    let mut ctx = AnalysisContext::default();
    let tenth = Zonotope::parse(&mut ctx, "0.1", FloatFormat::SINGLE).unwrap();
    let mut total = Zonotope::from_f64(&mut ctx, 0.0, FloatFormat::SINGLE);
    for _ in 0..1000 {
        total = total.add(&mut ctx, &tenth);
    }
    // The float sum drifts away from 100 but the real bound keeps it
    assert_ne!(zonofloat::numerics::to_f32(total.implementation()), 100.0);
    assert!(total.may_be(&real(100.0)));
    assert!(total.term_count() <= ctx.config().symbol_absorption_limit);
}
