//! Macros.

/// Logs at info level, using `info!`. Inactive in bench mode.
#[cfg(feature = "bench")]
macro_rules! log_info {
    ($($tt:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "bench"))]
macro_rules! log_info {
    ($($tt:tt)*) => {
        info! { $($tt)* }
    };
}

/// Logs at debug level. Inactive in bench mode.
#[cfg(feature = "bench")]
macro_rules! log_debug {
    ($($tt:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "bench"))]
macro_rules! log_debug {
    ($($tt:tt)*) => {
        debug! { $($tt)* }
    };
}

/// Does something if in debug mode.
#[cfg(debug_assertions)]
macro_rules! if_debug {
    ($($blah:tt)*) => {
        $($blah)*
    };
}
#[cfg(not(debug_assertions))]
macro_rules! if_debug {
    ($($blah:tt)*) => {
        ()
    };
}

/// Profiling macro.
///
/// If passed `self`, assumes `self` has a `_profiler` field.
#[cfg(not(feature = "bench"))]
macro_rules! profile {
    ( | $prof:ident | $stat:expr => add $e:expr ) => {
        $prof.stat_do($stat, |val| val + $e)
    };
    ( | $prof:ident | $meth:ident $( $scope:expr ),+ $(,)* ) => {
        $prof.$meth(vec![ $($scope),+ ])
    };
    ( $slf:ident $stat:expr => add $e:expr ) => {{
        let prof = &$slf._profiler;
        profile! { |prof| $stat => add $e }
    }};
    ( $slf:ident $meth:ident $( $scope:expr ),+ $(,)* ) => {{
        let prof = &$slf._profiler;
        profile! { |prof| $meth $($scope),+ }
    }};
}
#[cfg(feature = "bench")]
macro_rules! profile {
    ( $($tt:tt)* ) => {
        ()
    };
}

/// Creates a `usize` wrapper used as an index.
///
/// ```ignore
/// wrap_usize! {
///     #[doc = "Formula node index."]
///     FIdx
/// }
/// ```
macro_rules! wrap_usize {
    ( $(#[$meta:meta])* $name:ident ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);
        impl $name {
            /// Wrapped value.
            #[inline]
            pub fn get(self) -> usize {
                self.0
            }
        }
        impl From<usize> for $name {
            #[inline]
            fn from(n: usize) -> Self {
                $name(n)
            }
        }
        impl ::std::fmt::Display for $name {
            fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(fmt, "{}", self.0)
            }
        }
    };
}
