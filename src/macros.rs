pub use enclose::*;

/// Applies operators left to right.
///
/// ```ignore
/// let out = pipe!(source, map(|v: u32| v * 2), filter(|v: &u32| *v > 2));
/// ```
#[macro_export]
macro_rules! pipe {
    ($source:expr $(, $op:expr)* $(,)?) => {
        $source $(.pipe($op))*
    };
}

/// Builds a [`DerivedState`](crate::DerivedState) over several parents, binding
/// each parent's value by position. Parents are cloned, so handles stay usable.
///
/// ```ignore
/// let total = derived!((price, quantity) => |p, q| p * q);
/// ```
///
/// An optional capture list is cloned into the derive function the way
/// [`enclose!`] does it.
#[macro_export]
macro_rules! derived {
    (( $($d_tt:tt)* ) ( $($parent:expr),+ $(,)? ) => |$($arg:ident),+| $($body:tt)*) => {
        $crate::DerivedState::new(
            ( $($parent.clone(),)+ ),
            $crate::macros::enclose!(( $($d_tt)* ) move |( $($arg,)+ )| { $($body)* }),
        )
    };
    (( $($parent:expr),+ $(,)? ) => |$($arg:ident),+| $($body:tt)*) => {
        $crate::DerivedState::new(
            ( $($parent.clone(),)+ ),
            move |( $($arg,)+ )| { $($body)* },
        )
    };
}
