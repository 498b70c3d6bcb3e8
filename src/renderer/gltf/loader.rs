use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use glam::{Mat4, Quat, Vec3, Vec4};
use tinyjson::JsonValue;

use crate::renderer::gl;
use crate::renderer::gltf::{
    Accessor, BufferView, ElementType, Gltf, Image, Material, Mesh, Node, Primitive, Sampler,
    Scene, Texture,
};

type Object = HashMap<String, JsonValue>;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("{what} is missing the required member \"{member}\"")]
    MissingMember { what: String, member: &'static str },
    #[error("{what} has the wrong type, expected {expected}")]
    WrongType { what: String, expected: &'static str },
    #[error("invalid GLB container: {0}")]
    Glb(&'static str),
    #[error("buffer {index} holds {actual} bytes, but declares a byteLength of {declared}")]
    BufferTooShort {
        index: usize,
        declared: usize,
        actual: usize,
    },
    #[error("buffer {index} has an undecodable data URI: {reason}")]
    DataUri { index: usize, reason: String },
    #[error("buffer {0} has no uri, and there is no GLB BIN chunk to back it")]
    MissingBufferData(usize),
}

/// A loaded document, with the non-fatal problems found while loading it.
#[derive(Debug)]
pub struct Loaded {
    pub gltf: Gltf,
    pub warnings: Vec<String>,
}

/// Loads a .gltf or .glb file. External resources are resolved relative to
/// the file's directory.
pub fn load_gltf_file(path: &Path) -> Result<Loaded, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    if bytes.starts_with(GLB_MAGIC) {
        let (json, bin) = split_glb(&bytes)?;
        parse_gltf(json, bin, base_dir)
    } else {
        let json = std::str::from_utf8(&bytes).map_err(|err| LoadError::Json(err.to_string()))?;
        parse_gltf(json, None, base_dir)
    }
}

/// Splits a GLB container into its JSON chunk and optional BIN chunk.
fn split_glb(bytes: &[u8]) -> Result<(&str, Option<&[u8]>), LoadError> {
    let read_u32 = |offset: usize| {
        bytes
            .get(offset..offset + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or(LoadError::Glb("truncated header"))
    };
    if read_u32(4)? != 2 {
        return Err(LoadError::Glb("only version 2 is supported"));
    }
    let total_length = read_u32(8)? as usize;
    if total_length > bytes.len() {
        return Err(LoadError::Glb("file is shorter than its declared length"));
    }

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= total_length {
        let chunk_length = read_u32(offset)? as usize;
        let chunk_type = read_u32(offset + 4)?;
        let start = offset + 8;
        let chunk = bytes
            .get(start..start + chunk_length)
            .ok_or(LoadError::Glb("chunk extends past the end of the file"))?;
        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => {
                let text = std::str::from_utf8(chunk).map_err(|_| LoadError::Glb("JSON chunk is not UTF-8"))?;
                json = Some(text);
            }
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(chunk),
            _ => {} // Unknown chunks must be ignored.
        }
        // Chunks are padded to 4 byte boundaries.
        offset = start + chunk_length.next_multiple_of(4);
    }
    let json = json.ok_or(LoadError::Glb("no JSON chunk"))?;
    Ok((json, bin))
}

/// Parses the JSON part of a glTF, taking the GLB BIN chunk, if any, as the
/// data of the first uri-less buffer.
pub fn parse_gltf(json: &str, bin: Option<&[u8]>, base_dir: &Path) -> Result<Loaded, LoadError> {
    let root: JsonValue = json.parse().map_err(|err: tinyjson::JsonParseError| LoadError::Json(err.to_string()))?;
    let root = as_object(&root, "glTF root")?;
    let mut warnings = Vec::new();

    if let Some(asset) = root.get("asset") {
        let asset = as_object(asset, "asset")?;
        match asset.get("version").and_then(|v| v.get::<String>()) {
            Some(version) if version.starts_with('2') => {}
            Some(version) => warnings.push(format!("asset version is {version}, expected 2.x")),
            None => warnings.push("asset has no version".to_string()),
        }
    }
    for required in array(root, "extensionsRequired", "glTF root")? {
        if let Some(name) = required.get::<String>() {
            warnings.push(format!("required extension {name} is not supported, rendering may be wrong"));
        }
    }

    let mut buffers = Vec::new();
    for (i, buffer) in array(root, "buffers", "glTF root")?.iter().enumerate() {
        let what = format!("buffers[{i}]");
        let buffer = as_object(buffer, &what)?;
        let byte_length = required_usize(buffer, "byteLength", &what)?;
        let mut data = match buffer.get("uri") {
            Some(uri) => {
                let uri = as_string(uri, &format!("{what}.uri"))?;
                read_uri(uri, base_dir).map_err(|err| match err {
                    UriError::Io(path, source) => LoadError::Io { path, source },
                    UriError::DataUri(reason) => LoadError::DataUri { index: i, reason },
                })?
            }
            None if i == 0 => bin.ok_or(LoadError::MissingBufferData(i))?.to_vec(),
            None => return Err(LoadError::MissingBufferData(i)),
        };
        if data.len() < byte_length {
            return Err(LoadError::BufferTooShort {
                index: i,
                declared: byte_length,
                actual: data.len(),
            });
        }
        data.truncate(byte_length);
        buffers.push(data);
    }

    let mut buffer_views = Vec::new();
    for (i, buffer_view) in array(root, "bufferViews", "glTF root")?.iter().enumerate() {
        let what = format!("bufferViews[{i}]");
        let buffer_view = as_object(buffer_view, &what)?;
        buffer_views.push(BufferView {
            buffer: required_usize(buffer_view, "buffer", &what)?,
            byte_offset: optional_usize(buffer_view, "byteOffset", &what)?.unwrap_or(0),
            byte_length: required_usize(buffer_view, "byteLength", &what)?,
            byte_stride: optional_usize(buffer_view, "byteStride", &what)?,
            target: optional_usize(buffer_view, "target", &what)?.map(|t| t as gl::types::GLenum),
        });
    }

    let mut accessors = Vec::new();
    for (i, accessor) in array(root, "accessors", "glTF root")?.iter().enumerate() {
        let what = format!("accessors[{i}]");
        let accessor = as_object(accessor, &what)?;
        let type_name = as_string(required(accessor, "type", &what)?, &format!("{what}.type"))?;
        let element_type = ElementType::from_name(type_name).ok_or_else(|| LoadError::WrongType {
            what: format!("{what}.type"),
            expected: "one of SCALAR, VEC2, VEC3, VEC4, MAT2, MAT3, MAT4",
        })?;
        if accessor.contains_key("sparse") {
            warnings.push(format!("{what} is sparse, only its base values are used"));
        }
        accessors.push(Accessor {
            buffer_view: optional_usize(accessor, "bufferView", &what)?,
            byte_offset: optional_usize(accessor, "byteOffset", &what)?.unwrap_or(0),
            component_type: required_usize(accessor, "componentType", &what)? as gl::types::GLenum,
            element_type,
            count: required_usize(accessor, "count", &what)?,
            normalized: optional_bool(accessor, "normalized", &what)?.unwrap_or(false),
        });
    }

    let mut images = Vec::new();
    for (i, image) in array(root, "images", "glTF root")?.iter().enumerate() {
        let what = format!("images[{i}]");
        let image = as_object(image, &what)?;
        let encoded = if let Some(uri) = image.get("uri") {
            let uri = as_string(uri, &format!("{what}.uri"))?;
            read_uri(uri, base_dir).map_err(|err| err.to_string())
        } else if let Some(view_index) = optional_usize(image, "bufferView", &what)? {
            buffer_view_bytes(&buffers, &buffer_views, view_index)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| format!("bufferView {view_index} is out of range"))
        } else {
            Err("it has neither a uri nor a bufferView".to_string())
        };
        let pixels = encoded.and_then(|bytes| {
            image::load_from_memory(&bytes)
                .map(|decoded| decoded.to_rgba8())
                .map_err(|err| err.to_string())
        });
        match pixels {
            Ok(pixels) => images.push(Image { pixels: Some(pixels) }),
            Err(reason) => {
                let label = match image.get("name").and_then(|n| n.get::<String>()) {
                    Some(name) => format!("{what} ({name:?})"),
                    None => what,
                };
                warnings.push(format!("{label} could not be loaded, textures using it fall back to defaults: {reason}"));
                images.push(Image { pixels: None });
            }
        }
    }

    let mut samplers = Vec::new();
    for (i, sampler) in array(root, "samplers", "glTF root")?.iter().enumerate() {
        let what = format!("samplers[{i}]");
        let sampler = as_object(sampler, &what)?;
        let gl_enum = |key| -> Result<Option<gl::types::GLenum>, LoadError> {
            Ok(optional_usize(sampler, key, &what)?.map(|v| v as gl::types::GLenum))
        };
        samplers.push(Sampler {
            mag_filter: gl_enum("magFilter")?,
            min_filter: gl_enum("minFilter")?,
            wrap_s: gl_enum("wrapS")?.unwrap_or(gl::REPEAT),
            wrap_t: gl_enum("wrapT")?.unwrap_or(gl::REPEAT),
        });
    }

    let mut textures = Vec::new();
    for (i, texture) in array(root, "textures", "glTF root")?.iter().enumerate() {
        let what = format!("textures[{i}]");
        let texture = as_object(texture, &what)?;
        textures.push(Texture {
            source: optional_usize(texture, "source", &what)?,
            sampler: optional_usize(texture, "sampler", &what)?,
        });
    }

    let mut materials = Vec::new();
    for (i, material) in array(root, "materials", "glTF root")?.iter().enumerate() {
        materials.push(parse_material(material, &format!("materials[{i}]"))?);
    }

    let mut meshes = Vec::new();
    for (i, mesh) in array(root, "meshes", "glTF root")?.iter().enumerate() {
        let what = format!("meshes[{i}]");
        let mesh = as_object(mesh, &what)?;
        let mut primitives = Vec::new();
        for (j, primitive) in array(mesh, "primitives", &what)?.iter().enumerate() {
            let what = format!("{what}.primitives[{j}]");
            let primitive = as_object(primitive, &what)?;
            let attributes_json = as_object(required(primitive, "attributes", &what)?, &what)?;
            let mut attributes = BTreeMap::new();
            for (name, accessor) in attributes_json {
                attributes.insert(name.clone(), as_usize(accessor, &format!("{what}.attributes.{name}"))?);
            }
            if primitive.contains_key("targets") {
                warnings.push(format!("{what} has morph targets, which are ignored"));
            }
            primitives.push(Primitive {
                attributes,
                indices: optional_usize(primitive, "indices", &what)?,
                material_index: optional_usize(primitive, "material", &what)?,
                mode: optional_usize(primitive, "mode", &what)?.unwrap_or(4) as gl::types::GLenum,
            });
        }
        meshes.push(Mesh { primitives });
    }

    let mut nodes = Vec::new();
    for (i, node) in array(root, "nodes", "glTF root")?.iter().enumerate() {
        let what = format!("nodes[{i}]");
        let node = as_object(node, &what)?;
        let child_node_indices = array(node, "children", &what)?
            .iter()
            .enumerate()
            .map(|(j, child)| as_usize(child, &format!("{what}.children[{j}]")))
            .collect::<Result<Vec<_>, _>>()?;
        let transform = if let Some(matrix) = floats::<16>(node, "matrix", &what)? {
            Mat4::from_cols_array(&matrix)
        } else {
            let translation = floats::<3>(node, "translation", &what)?
                .map(Vec3::from_array)
                .unwrap_or(Vec3::ZERO);
            let scale = floats::<3>(node, "scale", &what)?
                .map(Vec3::from_array)
                .unwrap_or(Vec3::ONE);
            let rotation = floats::<4>(node, "rotation", &what)?
                .map(|[x, y, z, w]| Quat::from_xyzw(x, y, z, w))
                .unwrap_or(Quat::IDENTITY);
            Mat4::from_scale_rotation_translation(scale, rotation, translation)
        };
        nodes.push(Node {
            name: node.get("name").and_then(|n| n.get::<String>()).cloned(),
            mesh_index: optional_usize(node, "mesh", &what)?,
            child_node_indices,
            transform,
        });
    }

    let mut scenes = Vec::new();
    for (i, scene) in array(root, "scenes", "glTF root")?.iter().enumerate() {
        let what = format!("scenes[{i}]");
        let scene = as_object(scene, &what)?;
        let node_indices = array(scene, "nodes", &what)?
            .iter()
            .enumerate()
            .map(|(j, node)| as_usize(node, &format!("{what}.nodes[{j}]")))
            .collect::<Result<Vec<_>, _>>()?;
        scenes.push(Scene { node_indices });
    }
    let default_scene = match optional_usize(root, "scene", "glTF root")? {
        Some(scene) => Some(scene),
        None if !scenes.is_empty() => {
            warnings.push("no default scene declared, showing scene 0".to_string());
            Some(0)
        }
        None => None,
    };

    Ok(Loaded {
        gltf: Gltf {
            default_scene,
            scenes,
            nodes,
            meshes,
            materials,
            textures,
            samplers,
            images,
            accessors,
            buffer_views,
            buffers,
        },
        warnings,
    })
}

fn parse_material(material: &JsonValue, what: &str) -> Result<Material, LoadError> {
    let material = as_object(material, what)?;
    let defaults = Material::default();
    let mut parsed = Material {
        normal_texture: texture_index(material, "normalTexture", what)?,
        emissive_texture: texture_index(material, "emissiveTexture", what)?,
        emissive_factor: floats::<3>(material, "emissiveFactor", what)?
            .map(Vec3::from_array)
            .unwrap_or(defaults.emissive_factor),
        ..defaults
    };
    if let Some(normal_texture) = material.get("normalTexture") {
        let normal_texture = as_object(normal_texture, &format!("{what}.normalTexture"))?;
        if let Some(scale) = optional_f32(normal_texture, "scale", what)? {
            parsed.normal_scale = scale;
        }
    }
    if let Some(pbr) = material.get("pbrMetallicRoughness") {
        let what = format!("{what}.pbrMetallicRoughness");
        let pbr = as_object(pbr, &what)?;
        if let Some(factor) = floats::<4>(pbr, "baseColorFactor", &what)? {
            parsed.base_color_factor = Vec4::from_array(factor);
        }
        parsed.base_color_texture = texture_index(pbr, "baseColorTexture", &what)?;
        if let Some(metallic) = optional_f32(pbr, "metallicFactor", &what)? {
            parsed.metallic_factor = metallic;
        }
        if let Some(roughness) = optional_f32(pbr, "roughnessFactor", &what)? {
            parsed.roughness_factor = roughness;
        }
        parsed.metallic_roughness_texture = texture_index(pbr, "metallicRoughnessTexture", &what)?;
    }
    Ok(parsed)
}

#[derive(Debug)]
enum UriError {
    Io(PathBuf, std::io::Error),
    DataUri(String),
}

impl std::fmt::Display for UriError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UriError::Io(path, err) => write!(f, "could not read {}: {err}", path.display()),
            UriError::DataUri(reason) => write!(f, "undecodable data URI: {reason}"),
        }
    }
}

/// Reads a `data:` URI or a file path relative to `base_dir`.
fn read_uri(uri: &str, base_dir: &Path) -> Result<Vec<u8>, UriError> {
    if let Some(data) = uri.strip_prefix("data:") {
        let Some((header, payload)) = data.split_once(',') else {
            return Err(UriError::DataUri("no ',' separating the header and the data".to_string()));
        };
        if !header.ends_with(";base64") {
            return Err(UriError::DataUri("only base64 data URIs are supported".to_string()));
        }
        return BASE64
            .decode(payload)
            .map_err(|err| UriError::DataUri(err.to_string()));
    }
    let path = base_dir.join(uri.replace("%20", " "));
    fs::read(&path).map_err(|err| UriError::Io(path, err))
}

fn buffer_view_bytes<'a>(
    buffers: &'a [Vec<u8>],
    buffer_views: &[BufferView],
    view_index: usize,
) -> Option<&'a [u8]> {
    let view = buffer_views.get(view_index)?;
    let buffer = buffers.get(view.buffer)?;
    buffer.get(view.byte_offset..view.byte_offset.checked_add(view.byte_length)?)
}

fn as_object<'a>(value: &'a JsonValue, what: &str) -> Result<&'a Object, LoadError> {
    value.get::<Object>().ok_or_else(|| LoadError::WrongType {
        what: what.to_string(),
        expected: "an object",
    })
}

fn as_string<'a>(value: &'a JsonValue, what: &str) -> Result<&'a str, LoadError> {
    value
        .get::<String>()
        .map(String::as_str)
        .ok_or_else(|| LoadError::WrongType {
            what: what.to_string(),
            expected: "a string",
        })
}

/// Return usize if JsonValue is a non-negative integer.
fn as_usize(value: &JsonValue, what: &str) -> Result<usize, LoadError> {
    match value.get::<f64>() {
        Some(&n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(LoadError::WrongType {
            what: what.to_string(),
            expected: "a non-negative integer",
        }),
    }
}

fn required<'a>(object: &'a Object, member: &'static str, what: &str) -> Result<&'a JsonValue, LoadError> {
    object.get(member).ok_or_else(|| LoadError::MissingMember {
        what: what.to_string(),
        member,
    })
}

fn required_usize(object: &Object, member: &'static str, what: &str) -> Result<usize, LoadError> {
    as_usize(required(object, member, what)?, &format!("{what}.{member}"))
}

fn optional_usize(object: &Object, member: &str, what: &str) -> Result<Option<usize>, LoadError> {
    object
        .get(member)
        .map(|value| as_usize(value, &format!("{what}.{member}")))
        .transpose()
}

fn optional_f32(object: &Object, member: &str, what: &str) -> Result<Option<f32>, LoadError> {
    object
        .get(member)
        .map(|value| {
            value.get::<f64>().map(|&n| n as f32).ok_or_else(|| LoadError::WrongType {
                what: format!("{what}.{member}"),
                expected: "a number",
            })
        })
        .transpose()
}

fn optional_bool(object: &Object, member: &str, what: &str) -> Result<Option<bool>, LoadError> {
    object
        .get(member)
        .map(|value| {
            value.get::<bool>().copied().ok_or_else(|| LoadError::WrongType {
                what: format!("{what}.{member}"),
                expected: "a boolean",
            })
        })
        .transpose()
}

/// An array member, or an empty slice if the member is absent.
fn array<'a>(object: &'a Object, member: &str, what: &str) -> Result<&'a [JsonValue], LoadError> {
    match object.get(member) {
        None => Ok(&[]),
        Some(value) => value
            .get::<Vec<JsonValue>>()
            .map(Vec::as_slice)
            .ok_or_else(|| LoadError::WrongType {
                what: format!("{what}.{member}"),
                expected: "an array",
            }),
    }
}

/// A fixed-size array of numbers, e.g. a transform or a color factor.
fn floats<const N: usize>(object: &Object, member: &str, what: &str) -> Result<Option<[f32; N]>, LoadError> {
    let Some(value) = object.get(member) else {
        return Ok(None);
    };
    let wrong_type = || LoadError::WrongType {
        what: format!("{what}.{member}"),
        expected: "an array of numbers of the right length",
    };
    let values = value.get::<Vec<JsonValue>>().ok_or_else(wrong_type)?;
    if values.len() != N {
        return Err(wrong_type());
    }
    let mut result = [0.0; N];
    for (slot, value) in result.iter_mut().zip(values) {
        *slot = *value.get::<f64>().ok_or_else(wrong_type)? as f32;
    }
    Ok(Some(result))
}

/// The "index" of a texture info object such as `baseColorTexture`.
fn texture_index(object: &Object, member: &str, what: &str) -> Result<Option<usize>, LoadError> {
    let Some(info) = object.get(member) else {
        return Ok(None);
    };
    let what = format!("{what}.{member}");
    Ok(Some(required_usize(as_object(info, &what)?, "index", &what)?))
}
