//! Shared pipeline-state objects.

use super::{
    BlendDesc, BlendStateHandle, DepthDesc, DepthStateHandle, GpuContext, GpuResource,
    RasterizerDesc, RasterizerStateHandle, SamplerDesc, SamplerHandle,
};
use crate::error::Result;
use std::collections::HashMap;

/// Owns state objects created for one loaded model, one per distinct descriptor.
///
/// Materials that map to the same descriptor share a handle. Everything is
/// released together by [`StateArena::release_all`].
#[derive(Debug, Default)]
pub struct StateArena {
    blend: HashMap<BlendDesc, BlendStateHandle>,
    depth: HashMap<DepthDesc, DepthStateHandle>,
    rasterizer: HashMap<RasterizerDesc, RasterizerStateHandle>,
    samplers: HashMap<SamplerDesc, SamplerHandle>,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blend_state<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        desc: &BlendDesc,
    ) -> Result<BlendStateHandle> {
        if let Some(handle) = self.blend.get(desc) {
            return Ok(*handle);
        }
        let handle = ctx.create_blend_state(desc)?;
        self.blend.insert(*desc, handle);
        Ok(handle)
    }

    pub fn depth_state<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        desc: &DepthDesc,
    ) -> Result<DepthStateHandle> {
        if let Some(handle) = self.depth.get(desc) {
            return Ok(*handle);
        }
        let handle = ctx.create_depth_state(desc)?;
        self.depth.insert(*desc, handle);
        Ok(handle)
    }

    pub fn rasterizer_state<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerStateHandle> {
        if let Some(handle) = self.rasterizer.get(desc) {
            return Ok(*handle);
        }
        let handle = ctx.create_rasterizer_state(desc)?;
        self.rasterizer.insert(*desc, handle);
        Ok(handle)
    }

    pub fn sampler<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        desc: &SamplerDesc,
    ) -> Result<SamplerHandle> {
        if let Some(handle) = self.samplers.get(desc) {
            return Ok(*handle);
        }
        let handle = ctx.create_sampler(desc)?;
        self.samplers.insert(*desc, handle);
        Ok(handle)
    }

    /// Number of distinct objects held.
    pub fn len(&self) -> usize {
        self.blend.len() + self.depth.len() + self.rasterizer.len() + self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every object and empty the arena.
    pub fn release_all<C: GpuContext + ?Sized>(&mut self, ctx: &mut C) {
        for (_, h) in self.blend.drain() {
            ctx.release(GpuResource::BlendState(h));
        }
        for (_, h) in self.depth.drain() {
            ctx.release(GpuResource::DepthState(h));
        }
        for (_, h) in self.rasterizer.drain() {
            ctx.release(GpuResource::RasterizerState(h));
        }
        for (_, h) in self.samplers.drain() {
            ctx.release(GpuResource::Sampler(h));
        }
    }
}
