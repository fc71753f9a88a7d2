//! App - ports を組み合わせて dispatch キューを組み立てる

pub mod builder;

pub use self::builder::DispatcherBuilder;
