pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn browse() -> LogCtx<ops::browse::Browse> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn catalog() -> LogCtx<ops::catalog::Catalog> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn admin() -> LogCtx<ops::admin::Admin> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn watch() -> LogCtx<ops::watch::Watch> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
