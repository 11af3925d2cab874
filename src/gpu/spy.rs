//! Recording wrapper around a context, for tests.

use super::*;

/// A call observed by [`SpyContext`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Create(&'static str),
    Release(GpuResource),
    Restore(PipelineSnapshot),
    SetRenderTarget(Option<RenderTarget>),
    SetTexture(Option<TextureHandle>),
    Clear,
    Draw(Topology, u32, u32),
}

/// Forwards to an inner context and records what the pipeline asked for.
pub(crate) struct SpyContext<C> {
    pub inner: C,
    pub calls: Vec<Call>,
    /// Fail every draw after this many have succeeded.
    pub fail_draws_after: Option<usize>,
}

impl<C: GpuContext> SpyContext<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: Vec::new(),
            fail_draws_after: None,
        }
    }

    pub fn draws(&self) -> Vec<(Topology, u32, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(t, first, count) => Some((*t, *first, *count)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| wanted(c)).count()
    }
}

impl<C: GpuContext> GpuContext for SpyContext<C> {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<BufferHandle> {
        self.calls.push(Call::Create("buffer"));
        self.inner.create_buffer(kind, contents)
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureHandle> {
        self.calls.push(Call::Create("texture"));
        self.inner.create_texture(desc, data)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        self.calls.push(Call::Create("sampler"));
        self.inner.create_sampler(desc)
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<BlendStateHandle> {
        self.calls.push(Call::Create("blend"));
        self.inner.create_blend_state(desc)
    }

    fn create_depth_state(&mut self, desc: &DepthDesc) -> Result<DepthStateHandle> {
        self.calls.push(Call::Create("depth"));
        self.inner.create_depth_state(desc)
    }

    fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<RasterizerStateHandle> {
        self.calls.push(Call::Create("rasterizer"));
        self.inner.create_rasterizer_state(desc)
    }

    fn release(&mut self, resource: GpuResource) {
        self.calls.push(Call::Release(resource));
        self.inner.release(resource)
    }

    fn snapshot(&self) -> PipelineSnapshot {
        self.inner.snapshot()
    }

    fn restore(&mut self, snapshot: &PipelineSnapshot) {
        self.calls.push(Call::Restore(*snapshot));
        self.inner.restore(snapshot)
    }

    fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.calls.push(Call::SetRenderTarget(target));
        self.inner.set_render_target(target)
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.inner.set_viewport(viewport)
    }

    fn set_blend_state(&mut self, state: Option<BlendStateHandle>) {
        self.inner.set_blend_state(state)
    }

    fn set_depth_state(&mut self, state: Option<DepthStateHandle>) {
        self.inner.set_depth_state(state)
    }

    fn set_rasterizer_state(&mut self, state: Option<RasterizerStateHandle>) {
        self.inner.set_rasterizer_state(state)
    }

    fn set_texture(&mut self, texture: Option<TextureHandle>, sampler: Option<SamplerHandle>) {
        self.calls.push(Call::SetTexture(texture));
        self.inner.set_texture(texture, sampler)
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.inner.set_vertex_buffer(buffer)
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.inner.set_index_buffer(buffer)
    }

    fn set_uniforms(&mut self, uniforms: &DrawUniforms) {
        self.inner.set_uniforms(uniforms)
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) -> Result<()> {
        self.calls.push(Call::Clear);
        self.inner.clear(color, depth)
    }

    fn draw_indexed(&mut self, topology: Topology, first: u32, count: u32) -> Result<()> {
        let done = self.draws().len();
        if self.fail_draws_after.is_some_and(|limit| done >= limit) {
            return Err(crate::error::ThumbnailError::ResourceUnavailable(
                "device lost".to_string(),
            ));
        }
        self.calls.push(Call::Draw(topology, first, count));
        self.inner.draw_indexed(topology, first, count)
    }

    fn read_texture_rgba8(&self, texture: TextureHandle) -> Result<Vec<u8>> {
        self.inner.read_texture_rgba8(texture)
    }
}
