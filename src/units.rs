//! Newtype wrappers for the physical and financial quantities used in the model.
//!
//! Arithmetic between unit types is only defined where the result has a meaningful unit, e.g.
//! `MoneyPerEnergy * Energy = Money`.
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Define a new quantity type wrapping an `f64`
macro_rules! unit_struct {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Create a new quantity from an `f64`
            pub fn new(value: f64) -> Self {
                Self(value)
            }

            /// The underlying value
            pub fn value(&self) -> f64 {
                self.0
            }

            /// Whether the value is finite (i.e. not NaN or infinite)
            pub fn is_finite(&self) -> bool {
                self.0.is_finite()
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }
    };
}

/// Multiplication of two quantities, in either order
macro_rules! impl_mul {
    ($lhs:ty, $rhs:ty, $out:ty) => {
        impl Mul<$rhs> for $lhs {
            type Output = $out;
            fn mul(self, rhs: $rhs) -> $out {
                <$out>::new(self.0 * rhs.0)
            }
        }

        impl Mul<$lhs> for $rhs {
            type Output = $out;
            fn mul(self, lhs: $lhs) -> $out {
                <$out>::new(self.0 * lhs.0)
            }
        }
    };
}

/// Division of one quantity by another
macro_rules! impl_div {
    ($lhs:ty, $rhs:ty, $out:ty) => {
        impl Div<$rhs> for $lhs {
            type Output = $out;
            fn div(self, rhs: $rhs) -> $out {
                <$out>::new(self.0 / rhs.0)
            }
        }
    };
}

/// A dimensionless quantity, such as a fraction or ratio
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Create a new dimensionless value
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The underlying value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether the value is finite
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

impl From<f64> for Dimensionless {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Add for Dimensionless {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Dimensionless {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Dimensionless {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Div for Dimensionless {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self(self.0 / rhs.0)
    }
}

unit_struct!(
    /// Power capacity in MW
    Capacity
);
unit_struct!(
    /// Energy in MWh
    Energy
);
unit_struct!(
    /// Duration in hours
    Hours
);
unit_struct!(
    /// Money in real dollars
    Money
);
unit_struct!(
    /// Price of energy in $/MWh
    MoneyPerEnergy
);
unit_struct!(
    /// Annual price of capacity in $/MW-yr
    MoneyPerCapacity
);
unit_struct!(
    /// Emissions intensity in tonnes/MWh
    EmissionsPerEnergy
);
unit_struct!(
    /// Price of emissions in $/tonne
    MoneyPerEmissions
);

impl_mul!(Capacity, Hours, Energy);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerCapacity, Capacity, Money);
impl_div!(Energy, Capacity, Hours);
impl_div!(Energy, Hours, Capacity);
impl_div!(Money, Energy, MoneyPerEnergy);
