use crate::backend::Program;

const PASS_BLOCK: &str = r#"
layout(push_constant) uniform Pass {
    vec2 texel_size;
    vec2 dye_texel_size;
    vec2 point;
    float dt;
    float dissipation;
    vec4 color;
    float curl;
    float aspect_ratio;
    float radius;
    float value;
} pc;
"#;

const VERT_BODY: &str = r#"
layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec2 v_l;
layout(location = 2) out vec2 v_r;
layout(location = 3) out vec2 v_t;
layout(location = 4) out vec2 v_b;
vec2 positions[3] = vec2[](
    vec2(-1.0, -1.0),
    vec2( 3.0, -1.0),
    vec2(-1.0,  3.0)
);
void main() {
    vec2 p = positions[gl_VertexIndex];
    v_uv = p * 0.5 + 0.5;
    v_l = v_uv - vec2(pc.texel_size.x, 0.0);
    v_r = v_uv + vec2(pc.texel_size.x, 0.0);
    v_t = v_uv + vec2(0.0, pc.texel_size.y);
    v_b = v_uv - vec2(0.0, pc.texel_size.y);
    gl_Position = vec4(p, 0.0, 1.0);
}
"#;

const FRAG_INPUTS: &str = r#"
layout(location = 0) in vec2 v_uv;
layout(location = 1) in vec2 v_l;
layout(location = 2) in vec2 v_r;
layout(location = 3) in vec2 v_t;
layout(location = 4) in vec2 v_b;
layout(location = 0) out vec4 o_color;
"#;

const SPLAT: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_target;
void main() {
    vec2 p = v_uv - pc.point;
    p.x *= pc.aspect_ratio;
    vec3 splat = exp(-dot(p, p) / pc.radius) * pc.color.rgb;
    vec3 base = texture(u_target, v_uv).xyz;
    o_color = vec4(base + splat, 1.0);
}
"#;

const CURL: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_velocity;
void main() {
    float l = texture(u_velocity, v_l).y;
    float r = texture(u_velocity, v_r).y;
    float t = texture(u_velocity, v_t).x;
    float b = texture(u_velocity, v_b).x;
    o_color = vec4(0.5 * (r - l - t + b), 0.0, 0.0, 1.0);
}
"#;

const VORTICITY: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_velocity;
layout(set = 0, binding = 1) uniform sampler2D u_curl;
void main() {
    float l = texture(u_curl, v_l).x;
    float r = texture(u_curl, v_r).x;
    float t = texture(u_curl, v_t).x;
    float b = texture(u_curl, v_b).x;
    float c = texture(u_curl, v_uv).x;
    vec2 force = 0.5 * vec2(abs(t) - abs(b), abs(r) - abs(l));
    force /= length(force) + 0.0001;
    force *= pc.curl * c;
    force.y *= -1.0;
    vec2 velocity = texture(u_velocity, v_uv).xy;
    velocity += force * pc.dt;
    velocity = clamp(velocity, -1000.0, 1000.0);
    o_color = vec4(velocity, 0.0, 1.0);
}
"#;

const DIVERGENCE: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_velocity;
void main() {
    float l = texture(u_velocity, v_l).x;
    float r = texture(u_velocity, v_r).x;
    float t = texture(u_velocity, v_t).y;
    float b = texture(u_velocity, v_b).y;
    vec2 c = texture(u_velocity, v_uv).xy;
    if (v_l.x < 0.0) { l = -c.x; }
    if (v_r.x > 1.0) { r = -c.x; }
    if (v_t.y > 1.0) { t = -c.y; }
    if (v_b.y < 0.0) { b = -c.y; }
    o_color = vec4(0.5 * (r - l + t - b), 0.0, 0.0, 1.0);
}
"#;

const CLEAR: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_texture;
void main() {
    o_color = pc.value * texture(u_texture, v_uv);
}
"#;

const PRESSURE: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_pressure;
layout(set = 0, binding = 1) uniform sampler2D u_divergence;
void main() {
    float l = texture(u_pressure, v_l).x;
    float r = texture(u_pressure, v_r).x;
    float t = texture(u_pressure, v_t).x;
    float b = texture(u_pressure, v_b).x;
    float divergence = texture(u_divergence, v_uv).x;
    o_color = vec4((l + r + b + t - divergence) * 0.25, 0.0, 0.0, 1.0);
}
"#;

const GRADIENT_SUBTRACT: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_pressure;
layout(set = 0, binding = 1) uniform sampler2D u_velocity;
void main() {
    float l = texture(u_pressure, v_l).x;
    float r = texture(u_pressure, v_r).x;
    float t = texture(u_pressure, v_t).x;
    float b = texture(u_pressure, v_b).x;
    vec2 velocity = texture(u_velocity, v_uv).xy;
    velocity -= vec2(r - l, t - b);
    o_color = vec4(velocity, 0.0, 1.0);
}
"#;

const ADVECTION: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_velocity;
layout(set = 0, binding = 1) uniform sampler2D u_source;
vec4 bilerp(sampler2D sam, vec2 uv, vec2 tsize) {
    vec2 st = uv / tsize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(sam, (iuv + vec2(0.5, 0.5)) * tsize);
    vec4 b = texture(sam, (iuv + vec2(1.5, 0.5)) * tsize);
    vec4 c = texture(sam, (iuv + vec2(0.5, 1.5)) * tsize);
    vec4 d = texture(sam, (iuv + vec2(1.5, 1.5)) * tsize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}
void main() {
    vec2 coord = v_uv - pc.dt * bilerp(u_velocity, v_uv, pc.texel_size).xy * pc.texel_size;
    vec4 result = bilerp(u_source, coord, pc.dye_texel_size);
    o_color = result / (1.0 + pc.dissipation * pc.dt);
}
"#;

// Swapchain rows run top-down, so the field is read upside down here.
const DISPLAY: &str = r#"
layout(set = 0, binding = 0) uniform sampler2D u_texture;
void main() {
    vec2 uv = vec2(v_uv.x, 1.0 - v_uv.y);
    vec3 c = texture(u_texture, uv).rgb;
    float brightness = max(c.r, max(c.g, c.b));
    float tint_mix = sin(uv.x * 10.0 + uv.y * 8.0) * 0.5 + 0.5;
    vec3 tint = mix(vec3(0.65, 0.55, 0.15), vec3(0.45, 0.25, 0.55), tint_mix);
    vec3 normalized = c / max(0.01, brightness);
    vec3 tinted = normalized * tint * brightness * 1.2;
    c = mix(c, tinted, smoothstep(0.15, 0.4, brightness));
    c = min(c, vec3(0.7, 0.75, 0.6));
    float a = max(c.r, max(c.g, c.b));
    o_color = vec4(c, a * 0.85);
}
"#;

pub fn vertex_source() -> String {
    format!("#version 450\n{PASS_BLOCK}{VERT_BODY}")
}

pub fn fragment_source(program: Program) -> String {
    let body = match program {
        Program::Splat => SPLAT,
        Program::Curl => CURL,
        Program::Vorticity => VORTICITY,
        Program::Divergence => DIVERGENCE,
        Program::Clear => CLEAR,
        Program::Pressure => PRESSURE,
        Program::GradientSubtract => GRADIENT_SUBTRACT,
        Program::Advection => ADVECTION,
        Program::Display => DISPLAY,
    };
    format!("#version 450\n{PASS_BLOCK}{FRAG_INPUTS}{body}")
}
