//! Build lifecycle hooks.
//!
//! Hooks are registered programmatically through a [`HookSetup`] that runs
//! once per resolved config. Handlers are async and always awaited, in
//! registration order; the first error aborts that config's build.

use std::sync::Arc;

use bento_config::ResolvedConfig;
use futures::future::BoxFuture;

use crate::bundler::{BuildOptions, Chunk};
use crate::error::{BuildError, Result};

/// `build:prepare`: before cleaning and before any option is built.
pub struct PrepareContext {
    pub config: ResolvedConfig,
}

/// `build:before`: once per engine invocation, with options that may still be edited.
pub struct BeforeContext {
    pub config: ResolvedConfig,
    pub build_options: BuildOptions,
}

/// `build:done`: after post-build steps, with everything emitted so far.
pub struct DoneContext {
    pub config: ResolvedConfig,
    pub chunks: Vec<Chunk>,
}

type Handler<C> = Arc<dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

/// Installs handlers on the hooks of one config.
pub type HookSetup = Arc<dyn Fn(&mut Hooks, &ResolvedConfig) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    prepare: Vec<Handler<PrepareContext>>,
    before: Vec<Handler<BeforeContext>>,
    done: Vec<Handler<DoneContext>>,
}

impl Hooks {
    pub fn new(config: &ResolvedConfig, setup: Option<&HookSetup>) -> Self {
        let mut hooks = Hooks::default();
        if let Some(setup) = setup {
            setup(&mut hooks, config);
        }
        hooks
    }

    pub fn on_prepare<F>(&mut self, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut PrepareContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.prepare.push(Arc::new(handler));
        self
    }

    pub fn on_before<F>(&mut self, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut BeforeContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(handler));
        self
    }

    pub fn on_done<F>(&mut self, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut DoneContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.done.push(Arc::new(handler));
        self
    }

    pub async fn prepare(&self, ctx: &mut PrepareContext) -> Result<()> {
        call("build:prepare", &self.prepare, ctx).await
    }

    pub async fn before(&self, ctx: &mut BeforeContext) -> Result<()> {
        call("build:before", &self.before, ctx).await
    }

    pub async fn done(&self, ctx: &mut DoneContext) -> Result<()> {
        call("build:done", &self.done, ctx).await
    }

    pub fn is_empty(&self) -> bool {
        self.prepare.is_empty() && self.before.is_empty() && self.done.is_empty()
    }
}

async fn call<C>(event: &'static str, handlers: &[Handler<C>], ctx: &mut C) -> Result<()> {
    for handler in handlers {
        handler(&mut *ctx)
            .await
            .map_err(|source| BuildError::Hook { event, source })?;
    }
    Ok(())
}
