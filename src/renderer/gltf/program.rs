use crate::renderer::gl::{self, ShaderError};

pub const DEFAULT_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
layout(location = 3) in vec4 TANGENT;
out vec3 vViewSpacePosition;
out vec3 vViewSpaceNormal;
out vec3 vViewSpaceTangent;
out float vBitangentSign;
out vec2 vTexCoords;
uniform mat4 uModelViewProjMatrix;
uniform mat4 uModelViewMatrix;
uniform mat4 uNormalMatrix;
void main() {
    vViewSpacePosition = vec3(uModelViewMatrix * vec4(POSITION, 1.0));
    vViewSpaceNormal = normalize(vec3(uNormalMatrix * vec4(NORMAL, 0.0)));
    vViewSpaceTangent = vec3(uModelViewMatrix * vec4(TANGENT.xyz, 0.0));
    vBitangentSign = TANGENT.w < 0.0 ? -1.0 : 1.0;
    vTexCoords = TEXCOORD_0;
    gl_Position = uModelViewProjMatrix * vec4(POSITION, 1.0);
}
"#;

pub const DEFAULT_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

struct PointLight {
    vec3 position;
    vec3 intensity;
    float distance;
};

struct SpotLight {
    vec3 position;
    vec3 intensity;
    vec3 direction;
    float cutOff;
    float outerCutOff;
    float attenuationDistance;
};

in vec3 vViewSpacePosition;
in vec3 vViewSpaceNormal;
in vec3 vViewSpaceTangent;
in float vBitangentSign;
in vec2 vTexCoords;

uniform vec3 uLightDirection;
uniform vec3 uLightIntensity;
uniform PointLight uPointLights[4];
uniform SpotLight uSpotLight;
uniform bool uActiveNormalMap;

uniform sampler2D uBaseColorTexture;
uniform vec4 uBaseColorFactor;
uniform sampler2D uMetallicRoughnessTexture;
uniform bool uHasMetallicRoughnessTexture;
uniform float uMetallicFactor;
uniform float uRoughnessFactor;
uniform sampler2D uEmissiveTexture;
uniform bool uHasEmissiveTexture;
uniform vec3 uEmissiveFactor;
uniform sampler2D uNormalTexture;
uniform bool uHasNormalTexture;
uniform float uNormalScale;

out vec4 FRAG_COLOR;

const float PI = 3.14159265358979;
const vec3 DIELECTRIC_SPECULAR = vec3(0.04);
const vec3 BLACK = vec3(0.0);

vec4 srgbToLinear(vec4 srgb) {
    return vec4(pow(srgb.rgb, vec3(2.2)), srgb.a);
}

vec3 brdf(vec3 N, vec3 L, vec3 V, vec3 baseColor, float metallic, float roughness) {
    vec3 H = normalize(L + V);
    float NdotL = clamp(dot(N, L), 0.0, 1.0);
    float NdotV = clamp(dot(N, V), 0.0, 1.0);
    float NdotH = clamp(dot(N, H), 0.0, 1.0);
    float VdotH = clamp(dot(V, H), 0.0, 1.0);
    if (NdotL <= 0.0) {
        return BLACK;
    }

    vec3 cDiff = mix(baseColor * (1.0 - DIELECTRIC_SPECULAR.r), BLACK, metallic);
    vec3 f0 = mix(DIELECTRIC_SPECULAR, baseColor, metallic);
    float alpha = roughness * roughness;
    float alphaSquared = alpha * alpha;

    float baseShlickFactor = 1.0 - VdotH;
    float shlickFactor = baseShlickFactor * baseShlickFactor;
    shlickFactor *= shlickFactor;
    shlickFactor *= baseShlickFactor;
    vec3 F = f0 + (vec3(1.0) - f0) * shlickFactor;

    float visDenominator = NdotL * sqrt(NdotV * NdotV * (1.0 - alphaSquared) + alphaSquared)
        + NdotV * sqrt(NdotL * NdotL * (1.0 - alphaSquared) + alphaSquared);
    float Vis = visDenominator > 0.0 ? 0.5 / visDenominator : 0.0;

    float baseDenomD = NdotH * NdotH * (alphaSquared - 1.0) + 1.0;
    float D = alphaSquared / (PI * baseDenomD * baseDenomD);

    vec3 diffuse = cDiff / PI;
    vec3 fDiffuse = (1.0 - F) * diffuse;
    vec3 fSpecular = F * Vis * D;
    return (fDiffuse + fSpecular) * NdotL;
}

float rangeAttenuation(float lightDistance, float range) {
    float ratio = lightDistance / max(range, 0.0001);
    float falloff = clamp(1.0 - ratio * ratio * ratio * ratio, 0.0, 1.0);
    return falloff / max(lightDistance * lightDistance, 0.0001);
}

void main() {
    vec3 N = normalize(vViewSpaceNormal);
    // Nothing is culled, so back faces are lit from their own side.
    if (!gl_FrontFacing) {
        N = -N;
    }
    if (uActiveNormalMap && uHasNormalTexture) {
        vec3 T = normalize(vViewSpaceTangent - dot(vViewSpaceTangent, N) * N);
        vec3 B = cross(N, T) * vBitangentSign;
        vec3 tangentSpaceNormal = texture(uNormalTexture, vTexCoords).rgb * 2.0 - 1.0;
        tangentSpaceNormal.xy *= uNormalScale;
        N = normalize(mat3(T, B, N) * tangentSpaceNormal);
    }
    vec3 V = normalize(-vViewSpacePosition);

    vec4 baseColor = srgbToLinear(texture(uBaseColorTexture, vTexCoords)) * uBaseColorFactor;
    float metallic = uMetallicFactor;
    float roughness = uRoughnessFactor;
    if (uHasMetallicRoughnessTexture) {
        vec4 metallicRoughness = texture(uMetallicRoughnessTexture, vTexCoords);
        metallic *= metallicRoughness.b;
        roughness *= metallicRoughness.g;
    }

    vec3 color = brdf(N, normalize(uLightDirection), V, baseColor.rgb, metallic, roughness) * uLightIntensity;

    for (int i = 0; i < 4; i++) {
        vec3 toLight = uPointLights[i].position - vViewSpacePosition;
        float lightDistance = length(toLight);
        vec3 L = toLight / max(lightDistance, 0.0001);
        float attenuation = rangeAttenuation(lightDistance, uPointLights[i].distance);
        color += brdf(N, L, V, baseColor.rgb, metallic, roughness) * uPointLights[i].intensity * attenuation;
    }

    vec3 toSpot = uSpotLight.position - vViewSpacePosition;
    float spotDistance = length(toSpot);
    vec3 spotL = toSpot / max(spotDistance, 0.0001);
    float theta = dot(spotL, normalize(-uSpotLight.direction));
    float epsilon = max(uSpotLight.cutOff - uSpotLight.outerCutOff, 0.0001);
    float cone = clamp((theta - uSpotLight.outerCutOff) / epsilon, 0.0, 1.0);
    float spotAttenuation = rangeAttenuation(spotDistance, uSpotLight.attenuationDistance);
    color += brdf(N, spotL, V, baseColor.rgb, metallic, roughness) * uSpotLight.intensity * cone * spotAttenuation;

    vec3 emissive = uEmissiveFactor;
    if (uHasEmissiveTexture) {
        emissive *= srgbToLinear(texture(uEmissiveTexture, vTexCoords)).rgb;
    }
    color += emissive;

    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(color, vec3(1.0 / 2.2)), baseColor.a);
}
"#;

/// The texture units the program's samplers are bound to.
pub const BASE_COLOR_TEXTURE_UNIT: gl::types::GLint = 0;
pub const METALLIC_ROUGHNESS_TEXTURE_UNIT: gl::types::GLint = 1;
pub const EMISSIVE_TEXTURE_UNIT: gl::types::GLint = 2;
pub const NORMAL_TEXTURE_UNIT: gl::types::GLint = 3;

pub struct PointLightLocations {
    pub position: Option<gl::types::GLint>,
    pub intensity: Option<gl::types::GLint>,
    pub distance: Option<gl::types::GLint>,
}

pub struct SpotLightLocations {
    pub position: Option<gl::types::GLint>,
    pub intensity: Option<gl::types::GLint>,
    pub direction: Option<gl::types::GLint>,
    pub cut_off: Option<gl::types::GLint>,
    pub outer_cut_off: Option<gl::types::GLint>,
    pub attenuation_distance: Option<gl::types::GLint>,
}

/// The compiled glTF program and its uniform locations. Locations are None
/// when the uniform was optimized out (or a custom shader doesn't declare it),
/// and setting them is skipped.
pub struct ShaderProgram {
    pub program: gl::types::GLuint,
    pub model_view_proj_matrix: Option<gl::types::GLint>,
    pub model_view_matrix: Option<gl::types::GLint>,
    pub normal_matrix: Option<gl::types::GLint>,
    pub light_direction: Option<gl::types::GLint>,
    pub light_intensity: Option<gl::types::GLint>,
    pub active_normal_map: Option<gl::types::GLint>,
    pub base_color_texture: Option<gl::types::GLint>,
    pub base_color_factor: Option<gl::types::GLint>,
    pub metallic_roughness_texture: Option<gl::types::GLint>,
    pub has_metallic_roughness_texture: Option<gl::types::GLint>,
    pub metallic_factor: Option<gl::types::GLint>,
    pub roughness_factor: Option<gl::types::GLint>,
    pub emissive_texture: Option<gl::types::GLint>,
    pub has_emissive_texture: Option<gl::types::GLint>,
    pub emissive_factor: Option<gl::types::GLint>,
    pub normal_texture: Option<gl::types::GLint>,
    pub has_normal_texture: Option<gl::types::GLint>,
    pub normal_scale: Option<gl::types::GLint>,
    pub point_lights: [PointLightLocations; 4],
    pub spot_light: SpotLightLocations,
}

/// Compiles and returns the shader program which should be used to render the
/// glTF models.
pub fn create_program(vertex_source: &str, fragment_source: &str) -> Result<ShaderProgram, ShaderError> {
    let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, vertex_source)?;
    let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, fragment_source) {
        Ok(shader) => shader,
        Err(err) => {
            gl::call!(gl::DeleteShader(vertex_shader));
            return Err(err);
        }
    };
    let program = gl::create_program(&[vertex_shader, fragment_shader]);
    gl::call!(gl::DeleteShader(vertex_shader));
    gl::call!(gl::DeleteShader(fragment_shader));
    let program = program?;

    gl::call!(gl::UseProgram(program));
    let location = |name: &str| gl::get_uniform_location(program, name);
    let point_light = |i: usize| PointLightLocations {
        position: location(&format!("uPointLights[{i}].position")),
        intensity: location(&format!("uPointLights[{i}].intensity")),
        distance: location(&format!("uPointLights[{i}].distance")),
    };
    let shader_program = ShaderProgram {
        program,
        model_view_proj_matrix: location("uModelViewProjMatrix"),
        model_view_matrix: location("uModelViewMatrix"),
        normal_matrix: location("uNormalMatrix"),
        light_direction: location("uLightDirection"),
        light_intensity: location("uLightIntensity"),
        active_normal_map: location("uActiveNormalMap"),
        base_color_texture: location("uBaseColorTexture"),
        base_color_factor: location("uBaseColorFactor"),
        metallic_roughness_texture: location("uMetallicRoughnessTexture"),
        has_metallic_roughness_texture: location("uHasMetallicRoughnessTexture"),
        metallic_factor: location("uMetallicFactor"),
        roughness_factor: location("uRoughnessFactor"),
        emissive_texture: location("uEmissiveTexture"),
        has_emissive_texture: location("uHasEmissiveTexture"),
        emissive_factor: location("uEmissiveFactor"),
        normal_texture: location("uNormalTexture"),
        has_normal_texture: location("uHasNormalTexture"),
        normal_scale: location("uNormalScale"),
        point_lights: [point_light(0), point_light(1), point_light(2), point_light(3)],
        spot_light: SpotLightLocations {
            position: location("uSpotLight.position"),
            intensity: location("uSpotLight.intensity"),
            direction: location("uSpotLight.direction"),
            cut_off: location("uSpotLight.cutOff"),
            outer_cut_off: location("uSpotLight.outerCutOff"),
            attenuation_distance: location("uSpotLight.attenuationDistance"),
        },
    };

    // Samplers always read from the same units.
    for (location, unit) in [
        (shader_program.base_color_texture, BASE_COLOR_TEXTURE_UNIT),
        (shader_program.metallic_roughness_texture, METALLIC_ROUGHNESS_TEXTURE_UNIT),
        (shader_program.emissive_texture, EMISSIVE_TEXTURE_UNIT),
        (shader_program.normal_texture, NORMAL_TEXTURE_UNIT),
    ] {
        if let Some(location) = location {
            gl::call!(gl::Uniform1i(location, unit));
        }
    }
    Ok(shader_program)
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.program));
    }
}
