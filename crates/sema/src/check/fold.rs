//! Evaluation of operators on literal operands. `None` means the operation overflows the result
//! type, divides by zero or is otherwise undefined.

use alloy_primitives::{I256, U256};
use std::cmp::Ordering;
use vyc_data::{IntType, hir::{BinOp, CmpOp}};

pub(crate) fn binary(op: BinOp, ty: IntType, left: U256, right: U256) -> Option<U256> {
    let value = if ty.signed {
        let (l, r) = (I256::from_raw(left), I256::from_raw(right));
        let value = match op {
            BinOp::Add => l.checked_add(r)?,
            BinOp::Sub => l.checked_sub(r)?,
            BinOp::Mul => l.checked_mul(r)?,
            BinOp::Div => l.checked_div(r)?,
            BinOp::Mod => l.checked_rem(r)?,
            BinOp::Pow if r.is_negative() => return None,
            BinOp::Pow => l.checked_pow(r.into_raw())?,
            _ => return None,
        };
        value.into_raw()
    } else {
        match op {
            BinOp::Add => left.checked_add(right)?,
            BinOp::Sub => left.checked_sub(right)?,
            BinOp::Mul => left.checked_mul(right)?,
            BinOp::Div => left.checked_div(right)?,
            BinOp::Mod => left.checked_rem(right)?,
            BinOp::Pow => left.checked_pow(right)?,
            BinOp::BitAnd => left & right,
            BinOp::BitOr => left | right,
            BinOp::BitXor => left ^ right,
            BinOp::Shl if right >= U256::from(256) => U256::ZERO,
            BinOp::Shl => left << right.to::<usize>(),
            BinOp::Shr if right >= U256::from(256) => U256::ZERO,
            BinOp::Shr => left >> right.to::<usize>(),
        }
    };
    ty.contains(value).then_some(value)
}

pub(crate) fn compare(op: CmpOp, signed: bool, left: U256, right: U256) -> bool {
    let ordering = if signed {
        I256::from_raw(left).cmp(&I256::from_raw(right))
    } else {
        left.cmp(&right)
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::NotEq => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::LtEq => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::GtEq => ordering != Ordering::Less,
    }
}

pub(crate) fn negate(ty: IntType, value: U256) -> Option<U256> {
    if !ty.signed {
        return None;
    }
    let value = I256::from_raw(value).checked_neg()?.into_raw();
    ty.contains(value).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT8: IntType = IntType { signed: true, bits: 8 };

    fn int(value: i64) -> U256 {
        I256::try_from(value).unwrap().into_raw()
    }

    #[test]
    fn unsigned_overflow() {
        let u8 = IntType::UINT8;
        assert_eq!(binary(BinOp::Add, u8, U256::from(200), U256::from(55)), Some(U256::from(255)));
        assert_eq!(binary(BinOp::Add, u8, U256::from(200), U256::from(56)), None);
        assert_eq!(binary(BinOp::Sub, u8, U256::from(1), U256::from(2)), None);
        assert_eq!(binary(BinOp::Div, u8, U256::from(1), U256::ZERO), None);
        assert_eq!(binary(BinOp::Pow, IntType::UINT256, U256::from(2), U256::from(256)), None);
        assert_eq!(
            binary(BinOp::Pow, IntType::UINT256, U256::from(2), U256::from(255)),
            Some(U256::from(1) << 255)
        );
    }

    #[test]
    fn signed_arithmetic() {
        assert_eq!(binary(BinOp::Sub, INT8, int(-100), int(28)), Some(int(-128)));
        assert_eq!(binary(BinOp::Sub, INT8, int(-100), int(29)), None);
        assert_eq!(binary(BinOp::Div, INT8, int(-7), int(2)), Some(int(-3)));
        assert_eq!(binary(BinOp::Mod, INT8, int(-7), int(2)), Some(int(-1)));
        assert_eq!(binary(BinOp::Div, IntType::INT256, IntType::INT256.min(), int(-1)), None);
        assert_eq!(binary(BinOp::Pow, INT8, int(-2), int(7)), Some(int(-128)));
        assert_eq!(binary(BinOp::Pow, INT8, int(2), int(-1)), None);
        assert_eq!(binary(BinOp::BitAnd, INT8, int(1), int(1)), None);
    }

    #[test]
    fn shifts_saturate() {
        let u256 = IntType::UINT256;
        assert_eq!(binary(BinOp::Shl, u256, U256::from(1), U256::from(300)), Some(U256::ZERO));
        assert_eq!(binary(BinOp::Shr, u256, U256::from(8), U256::from(2)), Some(U256::from(2)));
    }

    #[test]
    fn comparisons_respect_sign() {
        assert!(compare(CmpOp::Lt, true, int(-1), int(0)));
        assert!(!compare(CmpOp::Lt, false, int(-1), int(0)));
        assert!(compare(CmpOp::GtEq, false, U256::from(3), U256::from(3)));
    }

    #[test]
    fn negation() {
        assert_eq!(negate(INT8, int(127)), Some(int(-127)));
        assert_eq!(negate(INT8, int(-128)), None);
        assert_eq!(negate(IntType::UINT8, U256::from(1)), None);
    }
}
