//! Chunk-by-chunk S3D parsing.
//!
//! Layout (little-endian). Chunk lengths include their own 8-byte header.
//!
//! ```text
//! prefix  "3DMD" total_len:4
//! HEAD    major:2 minor:2
//! VERT    count:4 { flags:2 vertex_count:2 format:4 (v4+) | format:2 stride:2 (v1-3) vertices }
//! INDX    count:4 { flags:2 stride:2 count:2 indices:2×count }
//! PRIM    count:4 { prim_count:2 { type:4 first:4 length:4 } }
//! MATS    count:4 { flags:4 alpha_func:1 depth_func:1 src_blend:1 dst_blend:1
//!                   alpha_threshold:2 class:4 reserved:1 texture_count:1
//!                   { id:4 wrap_s:1 wrap_t:1 [mag:1 min:1 (v5)] anim_rate:2 anim_mode:2
//!                     name_len:1 name } }
//! ANIM    frame_count:2 frame_rate:2 mode:2 flags:4 displacement:4 mesh_count:2
//!         { name_len:1 flags:1 name frame_count × { vert:2 index:2 prim:2 mats:2 } }
//! ```

use super::{
    AnimatedMesh, Animation, Frame, IndexBuffer, Material, MaterialFlags, MaterialTexture, Model,
    Primitive, PrimitiveBlock, PrimitiveType, Vertex, VertexBuffer, VertexFormat, BITFIELD_FLAG,
};
use crate::error::{Result, ThumbnailError};
use crate::types::{BoundingBox, ByteReader};

/// Upper bound on every per-chunk block count.
pub const MAX_BLOCKS: usize = 1000;

const CONTAINER_MAGIC: [u8; 4] = *b"3DMD";
const CHUNK_HEADER_LEN: usize = 8;

/// Parse an S3D model container.
///
/// The input must already be decompressed. Every failure is a returned
/// error; frame references are not checked against the buffer lists.
pub fn parse_model(bytes: &[u8]) -> Result<Model> {
    let mut prefix = ByteReader::new(bytes, "3DMD");
    let magic = prefix.read_magic()?;
    if magic != CONTAINER_MAGIC {
        return Err(prefix.error(format!(
            "bad container magic {:?}",
            String::from_utf8_lossy(&magic)
        )));
    }
    let total_len = prefix.read_u32_le()? as usize;

    let end = if total_len > bytes.len() {
        tracing::warn!(
            declared = total_len,
            actual = bytes.len(),
            "Model container is shorter than its declared length"
        );
        bytes.len()
    } else {
        total_len.max(CHUNK_HEADER_LEN)
    };
    let mut body = ByteReader::new(&bytes[CHUNK_HEADER_LEN..end], "3DMD");

    let mut head = open_chunk(&mut body, *b"HEAD", "HEAD")?;
    let major_version = head.read_u16_le()?;
    let minor_version = head.read_u16_le()?;
    if !Model::is_supported_version(minor_version) {
        return Err(head.error(format!(
            "unsupported version {}.{}",
            major_version, minor_version
        )));
    }

    let mut vert = open_chunk(&mut body, *b"VERT", "VERT")?;
    let vertex_buffers = read_blocks(&mut vert, |r| read_vertex_buffer(r, minor_version))?;

    let mut indx = open_chunk(&mut body, *b"INDX", "INDX")?;
    let index_buffers = read_blocks(&mut indx, read_index_buffer)?;

    let mut prim = open_chunk(&mut body, *b"PRIM", "PRIM")?;
    let primitive_blocks = read_blocks(&mut prim, read_primitive_block)?;

    let mut mats = open_chunk(&mut body, *b"MATS", "MATS")?;
    let materials = read_blocks(&mut mats, |r| read_material(r, minor_version))?;

    let mut anim = open_chunk(&mut body, *b"ANIM", "ANIM")?;
    let animation = read_animation(&mut anim)?;

    skip_trailing_chunks(&mut body);

    let bbox = Model::compute_bbox(&vertex_buffers);
    Ok(Model {
        major_version,
        minor_version,
        vertex_buffers,
        index_buffers,
        primitive_blocks,
        materials,
        animation,
        bbox,
    })
}

/// Read the next chunk header, check its magic and return a reader over its payload.
fn open_chunk<'a>(
    body: &mut ByteReader<'a>,
    expected: [u8; 4],
    section: &'static str,
) -> Result<ByteReader<'a>> {
    body.set_section(section);
    if body.remaining() < CHUNK_HEADER_LEN {
        return Err(body.error("chunk is missing"));
    }
    let magic = body.read_magic()?;
    if magic != expected {
        return Err(body.error(format!(
            "expected chunk {}, found {:?}",
            section,
            String::from_utf8_lossy(&magic)
        )));
    }
    let len = body.read_u32_le()? as usize;
    if len < CHUNK_HEADER_LEN {
        return Err(body.error(format!("chunk length {} is shorter than its header", len)));
    }

    let mut payload = len - CHUNK_HEADER_LEN;
    if payload > body.remaining() {
        tracing::warn!(
            chunk = section,
            declared = payload,
            available = body.remaining(),
            "Chunk runs past the end of the container, clamping"
        );
        payload = body.remaining();
    }
    body.sub_reader(payload, section)
}

/// Read a `u32` block count followed by that many blocks.
fn read_blocks<'a, T>(
    r: &mut ByteReader<'a>,
    mut read_one: impl FnMut(&mut ByteReader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = r.read_u32_le()? as usize;
    if count > MAX_BLOCKS {
        return Err(r.error(format!("{} blocks exceeds the limit of {}", count, MAX_BLOCKS)));
    }
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        blocks.push(read_one(r)?);
    }
    Ok(blocks)
}

/// Fail before allocating when `count` records of `size` bytes cannot be present.
fn ensure_records(r: &ByteReader<'_>, count: usize, size: usize, what: &str) -> Result<()> {
    if count.saturating_mul(size) > r.remaining() {
        return Err(r.error(format!(
            "{} {} of {} bytes need more than the {} bytes left",
            count,
            what,
            size,
            r.remaining()
        )));
    }
    Ok(())
}

fn read_vec3(r: &mut ByteReader<'_>) -> Result<[f32; 3]> {
    Ok([r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?])
}

fn read_vec2(r: &mut ByteReader<'_>) -> Result<[f32; 2]> {
    Ok([r.read_f32_le()?, r.read_f32_le()?])
}

fn read_vertex_buffer(r: &mut ByteReader<'_>, minor_version: u16) -> Result<VertexBuffer> {
    let flags = r.read_u16_le()?;
    let count = r.read_u16_le()? as usize;

    let (format_code, declared_stride) = if minor_version >= 4 {
        (r.read_u32_le()?, None)
    } else {
        let code = r.read_u16_le()?;
        let stride = r.read_u16_le()? as usize;
        // Legacy codes keep the bitfield marker in bit 15.
        let code = if code & 0x8000 != 0 {
            (code & 0x7FFF) as u32 | BITFIELD_FLAG
        } else {
            code as u32
        };
        (code, Some(stride))
    };

    let format = VertexFormat::decode(format_code);
    let consumed = format.byte_size();
    let stride = match declared_stride {
        Some(stride) if stride < consumed => {
            tracing::warn!(stride, consumed, "Vertex stride shorter than its format, using format size");
            consumed
        }
        Some(stride) => stride,
        None => consumed,
    };

    ensure_records(r, count, stride, "vertices")?;
    let mut vertices = Vec::with_capacity(count);
    for _ in 0..count {
        let mut v = r.sub_reader(stride, "VERT")?;
        let mut vertex = Vertex::new(read_vec3(&mut v)?);
        for _ in 1..format.positions {
            read_vec3(&mut v)?;
        }
        for i in 0..format.colors {
            let color = v.read_array::<4>()?;
            if i == 0 {
                vertex.color = color;
            }
        }
        for i in 0..format.uvs {
            let uv = read_vec2(&mut v)?;
            match i {
                0 => vertex.uv0 = Some(uv),
                1 => vertex.uv1 = Some(uv),
                _ => {}
            }
        }
        // Anything left in `v` is padding up to the stride.
        vertices.push(vertex);
    }

    let bbox = BoundingBox::from_points(vertices.iter().map(|v| v.position)).unwrap_or_default();
    Ok(VertexBuffer {
        flags,
        format_code,
        format,
        stride: stride as u32,
        vertices,
        bbox,
    })
}

fn read_index_buffer(r: &mut ByteReader<'_>) -> Result<IndexBuffer> {
    let flags = r.read_u16_le()?;
    let stride = r.read_u16_le()?;
    let count = r.read_u16_le()? as usize;

    ensure_records(r, count, 2, "indices")?;
    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        indices.push(r.read_u16_le()?);
    }

    Ok(IndexBuffer {
        flags,
        stride,
        indices,
    })
}

fn read_primitive_block(r: &mut ByteReader<'_>) -> Result<PrimitiveBlock> {
    let count = r.read_u16_le()? as usize;
    ensure_records(r, count, 12, "primitives")?;

    let mut primitives = Vec::with_capacity(count);
    for _ in 0..count {
        let code = r.read_u32_le()?;
        let kind = PrimitiveType::from_code(code).ok_or_else(|| {
            ThumbnailError::CorruptData(format!("unsupported primitive type {}", code))
        })?;
        let first = r.read_u32_le()?;
        let count = r.read_u32_le()?;
        primitives.push(Primitive { kind, first, count });
    }

    Ok(PrimitiveBlock { primitives })
}

fn read_material(r: &mut ByteReader<'_>, minor_version: u16) -> Result<Material> {
    let flags = MaterialFlags::from_bits_retain(r.read_u32_le()?);
    let alpha_func = r.read_u8()?;
    let depth_func = r.read_u8()?;
    let src_blend = r.read_u8()?;
    let dst_blend = r.read_u8()?;
    let alpha_threshold = r.read_u16_le()? as f32 / 65535.0;
    let material_class = r.read_u32_le()?;
    let _reserved = r.read_u8()?;
    let texture_count = r.read_u8()?;

    let mut textures = Vec::with_capacity(texture_count as usize);
    for _ in 0..texture_count {
        let texture_id = r.read_u32_le()?;
        let wrap_s = r.read_u8()?;
        let wrap_t = r.read_u8()?;
        let (mag_filter, min_filter) = if minor_version == 5 {
            (Some(r.read_u8()?), Some(r.read_u8()?))
        } else {
            (None, None)
        };
        let anim_rate = r.read_u16_le()?;
        let anim_mode = r.read_u16_le()?;
        let name_len = r.read_u8()? as usize;
        let anim_name = read_name(r, name_len)?;

        textures.push(MaterialTexture {
            texture_id,
            wrap_s,
            wrap_t,
            mag_filter,
            min_filter,
            anim_rate,
            anim_mode,
            anim_name,
        });
    }

    Ok(Material {
        flags,
        alpha_func,
        depth_func,
        src_blend,
        dst_blend,
        alpha_threshold,
        material_class,
        textures,
    })
}

fn read_name(r: &mut ByteReader<'_>, len: usize) -> Result<String> {
    let bytes = r.read_bytes(len)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn read_animation(r: &mut ByteReader<'_>) -> Result<Animation> {
    let frame_count = r.read_u16_le()?;
    let frame_rate = r.read_u16_le()?;
    let mode = r.read_u16_le()?;
    let flags = r.read_u32_le()?;
    let displacement = r.read_f32_le()?;
    let mesh_count = r.read_u16_le()? as usize;

    // Each mesh carries at least its two length/flag bytes.
    ensure_records(r, mesh_count, 2, "animated meshes")?;
    let mut meshes = Vec::with_capacity(mesh_count);
    for _ in 0..mesh_count {
        let name_len = r.read_u8()? as usize;
        let mesh_flags = r.read_u8()?;
        let name = read_name(r, name_len)?;

        ensure_records(r, frame_count as usize, 8, "frames")?;
        let mut frames = Vec::with_capacity(frame_count as usize);
        for _ in 0..frame_count {
            frames.push(Frame {
                vert_block: r.read_u16_le()?,
                index_block: r.read_u16_le()?,
                prim_block: r.read_u16_le()?,
                mats_block: r.read_u16_le()?,
            });
        }

        meshes.push(AnimatedMesh {
            name,
            flags: mesh_flags,
            frames,
        });
    }

    Ok(Animation {
        frame_count,
        frame_rate,
        mode,
        flags,
        displacement,
        meshes,
    })
}

/// Optional chunks after `ANIM` are not interpreted.
fn skip_trailing_chunks(body: &mut ByteReader<'_>) {
    while body.remaining() >= CHUNK_HEADER_LEN {
        let (Ok(magic), Ok(len)) = (body.read_magic(), body.read_u32_le()) else {
            return;
        };
        let payload = (len as usize)
            .saturating_sub(CHUNK_HEADER_LEN)
            .min(body.remaining());
        tracing::debug!(
            chunk = %String::from_utf8_lossy(&magic),
            bytes = payload,
            "Skipping trailing chunk"
        );
        if body.skip(payload).is_err() {
            return;
        }
    }
    if body.remaining() > 0 {
        tracing::debug!(bytes = body.remaining(), "Ignoring trailing bytes after chunks");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHUNK_NAMES: [&str; 6] = ["HEAD", "VERT", "INDX", "PRIM", "MATS", "ANIM"];

    fn put_u16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f32(out: &mut Vec<u8>, v: f32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// Chunk payloads of a model, in file order.
    fn chunk_payloads(model: &Model) -> Vec<Vec<u8>> {
        let minor = model.minor_version;

        let mut head = Vec::new();
        put_u16(&mut head, model.major_version);
        put_u16(&mut head, minor);

        let mut vert = Vec::new();
        put_u32(&mut vert, model.vertex_buffers.len() as u32);
        for vb in &model.vertex_buffers {
            put_u16(&mut vert, vb.flags);
            put_u16(&mut vert, vb.vertices.len() as u16);
            put_u32(&mut vert, vb.format_code);
            for v in &vb.vertices {
                for _ in 0..vb.format.positions {
                    v.position.iter().for_each(|c| put_f32(&mut vert, *c));
                }
                for _ in 0..vb.format.colors {
                    vert.extend_from_slice(&v.color);
                }
                for i in 0..vb.format.uvs {
                    let uv = if i == 0 { v.uv0 } else { v.uv1 }.unwrap_or([0.0; 2]);
                    uv.iter().for_each(|c| put_f32(&mut vert, *c));
                }
            }
        }

        let mut indx = Vec::new();
        put_u32(&mut indx, model.index_buffers.len() as u32);
        for ib in &model.index_buffers {
            put_u16(&mut indx, ib.flags);
            put_u16(&mut indx, ib.stride);
            put_u16(&mut indx, ib.indices.len() as u16);
            ib.indices.iter().for_each(|i| put_u16(&mut indx, *i));
        }

        let mut prim = Vec::new();
        put_u32(&mut prim, model.primitive_blocks.len() as u32);
        for block in &model.primitive_blocks {
            put_u16(&mut prim, block.primitives.len() as u16);
            for p in &block.primitives {
                put_u32(&mut prim, p.kind.code());
                put_u32(&mut prim, p.first);
                put_u32(&mut prim, p.count);
            }
        }

        let mut mats = Vec::new();
        put_u32(&mut mats, model.materials.len() as u32);
        for m in &model.materials {
            put_u32(&mut mats, m.flags.bits());
            mats.extend_from_slice(&[m.alpha_func, m.depth_func, m.src_blend, m.dst_blend]);
            put_u16(&mut mats, (m.alpha_threshold * 65535.0).round() as u16);
            put_u32(&mut mats, m.material_class);
            mats.push(0);
            mats.push(m.textures.len() as u8);
            for t in &m.textures {
                put_u32(&mut mats, t.texture_id);
                mats.extend_from_slice(&[t.wrap_s, t.wrap_t]);
                if minor == 5 {
                    mats.extend_from_slice(&[t.mag_filter.unwrap_or(1), t.min_filter.unwrap_or(1)]);
                }
                put_u16(&mut mats, t.anim_rate);
                put_u16(&mut mats, t.anim_mode);
                mats.push(t.anim_name.len() as u8);
                mats.extend_from_slice(t.anim_name.as_bytes());
            }
        }

        let a = &model.animation;
        let mut anim = Vec::new();
        put_u16(&mut anim, a.frame_count);
        put_u16(&mut anim, a.frame_rate);
        put_u16(&mut anim, a.mode);
        put_u32(&mut anim, a.flags);
        put_f32(&mut anim, a.displacement);
        put_u16(&mut anim, a.meshes.len() as u16);
        for mesh in &a.meshes {
            anim.push(mesh.name.len() as u8);
            anim.push(mesh.flags);
            anim.extend_from_slice(mesh.name.as_bytes());
            for f in &mesh.frames {
                put_u16(&mut anim, f.vert_block);
                put_u16(&mut anim, f.index_block);
                put_u16(&mut anim, f.prim_block);
                put_u16(&mut anim, f.mats_block);
            }
        }

        vec![head, vert, indx, prim, mats, anim]
    }

    /// Wrap chunk payloads into a container.
    fn assemble(payloads: &[Vec<u8>]) -> (Vec<u8>, Vec<(usize, usize)>) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"3DMD");
        put_u32(&mut bytes, 0);
        let mut ranges = Vec::new();
        for (name, payload) in CHUNK_NAMES.iter().zip(payloads) {
            let start = bytes.len();
            bytes.extend_from_slice(name.as_bytes());
            put_u32(&mut bytes, (payload.len() + CHUNK_HEADER_LEN) as u32);
            bytes.extend_from_slice(payload);
            ranges.push((start, bytes.len()));
        }
        let total = bytes.len() as u32;
        bytes[4..8].copy_from_slice(&total.to_le_bytes());
        (bytes, ranges)
    }

    /// Encode a model (version 4 or 5 layout).
    pub(crate) fn encode_model(model: &Model) -> Vec<u8> {
        assemble(&chunk_payloads(model)).0
    }

    /// One colored triangle, one untextured material, one frame.
    pub(crate) fn triangle_model(color_bgra: [u8; 4]) -> Model {
        let vertices = vec![
            Vertex::new([-1.0, 0.0, -1.0]).with_color_bgra(color_bgra),
            Vertex::new([1.0, 0.0, -1.0]).with_color_bgra(color_bgra),
            Vertex::new([0.0, 0.0, 1.0]).with_color_bgra(color_bgra),
        ];
        let vertex_buffers = vec![VertexBuffer::new(2, vertices)];
        let bbox = Model::compute_bbox(&vertex_buffers);
        Model {
            major_version: 1,
            minor_version: 5,
            vertex_buffers,
            index_buffers: vec![IndexBuffer::new(vec![0, 1, 2])],
            primitive_blocks: vec![PrimitiveBlock {
                primitives: vec![Primitive {
                    kind: PrimitiveType::TriangleList,
                    first: 0,
                    count: 3,
                }],
            }],
            materials: vec![Material::untextured()],
            animation: Animation {
                frame_count: 1,
                frame_rate: 0,
                mode: 0,
                flags: 0,
                displacement: 0.0,
                meshes: vec![AnimatedMesh {
                    name: "mesh".to_string(),
                    flags: 0,
                    frames: vec![Frame {
                        vert_block: 0,
                        index_block: 0,
                        prim_block: 0,
                        mats_block: 0,
                    }],
                }],
            },
            bbox,
        }
    }

    fn textured_model() -> Model {
        let mut model = triangle_model([0, 0, 255, 255]);
        let vertices = model.vertex_buffers[0]
            .vertices
            .iter()
            .map(|v| v.with_uv([0.5, 0.25]))
            .collect();
        model.vertex_buffers[0] = VertexBuffer::new(3, vertices);
        let mut texture = MaterialTexture::new(0xDEAD_BEEF);
        texture.mag_filter = Some(1);
        texture.min_filter = Some(0);
        texture.anim_name = "water".to_string();
        model.materials[0] = Material {
            flags: MaterialFlags::TEXTURED | MaterialFlags::ALPHA_TEST | MaterialFlags::DEPTH_TEST,
            alpha_func: 4,
            depth_func: 3,
            src_blend: 4,
            dst_blend: 5,
            alpha_threshold: 0.5,
            material_class: 2,
            textures: vec![texture],
        };
        model
    }

    #[test]
    fn test_parse_triangle() {
        let model = triangle_model([0, 0, 255, 255]);
        let parsed = parse_model(&encode_model(&model)).unwrap();
        assert_eq!(parsed.minor_version, 5);
        assert_eq!(parsed.vertex_buffers.len(), 1);
        assert_eq!(parsed.vertex_buffers[0].vertices[0].color_rgba(), [255, 0, 0, 255]);
        assert_eq!(parsed.index_buffers[0].indices, vec![0, 1, 2]);
        assert_eq!(
            parsed.primitive_blocks[0].primitives[0].kind,
            PrimitiveType::TriangleList
        );
        assert_eq!(parsed.animation.meshes[0].name, "mesh");
        assert_eq!(parsed.bbox.min, [-1.0, 0.0, -1.0]);
        assert_eq!(parsed.bbox.max, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parse_textured_material_v5() {
        let model = textured_model();
        let parsed = parse_model(&encode_model(&model)).unwrap();
        let material = &parsed.materials[0];
        assert!(material.is_textured());
        assert_eq!(material.src_blend, 4);
        assert!((material.alpha_threshold - 0.5).abs() < 1e-4);
        let texture = &material.textures[0];
        assert_eq!(texture.texture_id, 0xDEAD_BEEF);
        assert_eq!(texture.mag_filter, Some(1));
        assert_eq!(texture.min_filter, Some(0));
        assert_eq!(texture.anim_name, "water");
        assert_eq!(parsed.vertex_buffers[0].vertices[2].uv0, Some([0.5, 0.25]));
    }

    #[test]
    fn test_v4_materials_have_no_filters() {
        let mut model = textured_model();
        model.minor_version = 4;
        let parsed = parse_model(&encode_model(&model)).unwrap();
        let texture = &parsed.materials[0].textures[0];
        assert_eq!(texture.mag_filter, None);
        assert_eq!(texture.anim_name, "water");
    }

    #[test]
    fn test_legacy_vertex_stride_padding_is_skipped() {
        let mut model = triangle_model([0, 0, 0, 255]);
        model.minor_version = 3;
        let mut payloads = chunk_payloads(&model);

        // Format 1 (position + uv) is 20 bytes; pad each vertex to 24.
        let mut vert = Vec::new();
        put_u32(&mut vert, 1);
        put_u16(&mut vert, 0);
        put_u16(&mut vert, 2);
        put_u16(&mut vert, 1);
        put_u16(&mut vert, 24);
        for (x, u) in [(1.0f32, 0.25f32), (-3.0, 0.75)] {
            for c in [x, 2.0, 3.0, u, 1.0] {
                put_f32(&mut vert, c);
            }
            vert.extend_from_slice(&[0xAA; 4]);
        }
        payloads[1] = vert;

        let parsed = parse_model(&assemble(&payloads).0).unwrap();
        let vb = &parsed.vertex_buffers[0];
        assert_eq!(vb.stride, 24);
        assert_eq!(vb.vertices.len(), 2);
        assert_eq!(vb.vertices[1].position, [-3.0, 2.0, 3.0]);
        assert_eq!(vb.vertices[1].uv0, Some([0.75, 1.0]));
        assert_eq!(vb.vertices[1].color, Vertex::DEFAULT_COLOR);
        assert_eq!(vb.bbox.min, [-3.0, 2.0, 3.0]);
    }

    #[test]
    fn test_legacy_bitfield_format() {
        let mut model = triangle_model([0, 0, 0, 255]);
        model.minor_version = 2;
        let mut payloads = chunk_payloads(&model);

        // Bitfield in the 16-bit form: one position, one color.
        let mut vert = Vec::new();
        put_u32(&mut vert, 1);
        put_u16(&mut vert, 0);
        put_u16(&mut vert, 1);
        put_u16(&mut vert, 0x8000 | 1 | (1 << 8));
        put_u16(&mut vert, 16);
        for c in [4.0f32, 5.0, 6.0] {
            put_f32(&mut vert, c);
        }
        vert.extend_from_slice(&[10, 20, 30, 40]);
        payloads[1] = vert;

        let parsed = parse_model(&assemble(&payloads).0).unwrap();
        let vb = &parsed.vertex_buffers[0];
        assert_eq!(vb.format, VertexFormat::new(1, 1, 0));
        assert_eq!(vb.vertices[0].color, [10, 20, 30, 40]);
        assert_eq!(vb.vertices[0].uv0, None);
    }

    #[test]
    fn test_unsupported_version() {
        for minor in [0u16, 6] {
            let mut model = triangle_model([0, 0, 0, 255]);
            model.minor_version = minor;
            let err = parse_model(&encode_model(&model)).unwrap_err();
            assert_eq!(err.section(), Some("HEAD"));
        }
    }

    #[test]
    fn test_misordered_chunk_names_expected() {
        let model = triangle_model([0, 0, 0, 255]);
        let (mut bytes, ranges) = assemble(&chunk_payloads(&model));
        let (indx_start, _) = ranges[2];
        bytes[indx_start..indx_start + 4].copy_from_slice(b"MATS");
        let err = parse_model(&bytes).unwrap_err();
        assert_eq!(err.section(), Some("INDX"));
    }

    #[test]
    fn test_bad_container_magic() {
        let mut bytes = encode_model(&triangle_model([0, 0, 0, 255]));
        bytes[..4].copy_from_slice(b"3DMX");
        assert_eq!(parse_model(&bytes).unwrap_err().section(), Some("3DMD"));
    }

    #[test]
    fn test_unknown_primitive_type_is_corrupt() {
        let model = triangle_model([0, 0, 0, 255]);
        let mut payloads = chunk_payloads(&model);
        // count:4, prim_count:2, then the type word.
        payloads[3][6..10].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            parse_model(&assemble(&payloads).0),
            Err(ThumbnailError::CorruptData(_))
        ));
    }

    #[test]
    fn test_block_count_cap() {
        let model = triangle_model([0, 0, 0, 255]);
        let mut payloads = chunk_payloads(&model);
        payloads[2][..4].copy_from_slice(&(MAX_BLOCKS as u32 + 1).to_le_bytes());
        assert_eq!(
            parse_model(&assemble(&payloads).0).unwrap_err().section(),
            Some("INDX")
        );
    }

    #[test]
    fn test_huge_frame_count_rejected_without_allocating() {
        let model = triangle_model([0, 0, 0, 255]);
        let mut payloads = chunk_payloads(&model);
        payloads[5][..2].copy_from_slice(&u16::MAX.to_le_bytes());
        assert_eq!(
            parse_model(&assemble(&payloads).0).unwrap_err().section(),
            Some("ANIM")
        );
    }

    #[test]
    fn test_trailing_chunks_are_skipped() {
        let model = triangle_model([0, 0, 0, 255]);
        let mut bytes = encode_model(&model);
        bytes.extend_from_slice(b"PROP");
        put_u32(&mut bytes, 12);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let total = bytes.len() as u32;
        bytes[4..8].copy_from_slice(&total.to_le_bytes());
        assert_eq!(parse_model(&bytes).unwrap(), parse_model(&encode_model(&model)).unwrap());
    }

    #[test]
    fn test_truncation_names_the_chunk() {
        let model = textured_model();
        let (bytes, ranges) = assemble(&chunk_payloads(&model));

        for cut in 0..bytes.len() {
            let err = parse_model(&bytes[..cut]).unwrap_err();
            let expected = ranges
                .iter()
                .position(|&(start, end)| (start..end).contains(&cut))
                .map_or("3DMD", |i| CHUNK_NAMES[i]);
            assert_eq!(err.section(), Some(expected), "cut at {}", cut);
        }
    }

    proptest! {
        #[test]
        fn never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut bytes = bytes;
            if bytes.len() >= 4 {
                bytes[..4].copy_from_slice(b"3DMD");
            }
            let _ = parse_model(&bytes);
        }

        #[test]
        fn corrupted_models_never_panic(index in 0usize..4096, value in any::<u8>()) {
            let mut bytes = encode_model(&textured_model());
            let index = index % bytes.len();
            bytes[index] = value;
            let _ = parse_model(&bytes);
        }
    }
}
