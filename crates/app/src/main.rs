//! Headless demo: upload a textured quad to the recording device, draw it and
//! log every device call.

use std::rc::Rc;

use anyhow::{Context, Result};
use asset::{TextureKind, TextureRef, Vertex};
use renderer::recording::DeviceCall;
use renderer::{Mesh, RecordingDevice};

/// Samplers the demo program declares.
const PROGRAM_SAMPLERS: &[&str] = &[
    "texture_diffuse1",
    "texture_diffuse2",
    "texture_diffuse3",
    "texture_specular1",
    "texture_specular2",
    "texture_normal1",
    "texture_height1",
];

fn parse_textures_arg() -> Vec<TextureKind> {
    // Accept: --textures=diffuse,specular,texture_normal
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--textures=") {
            return val
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(TextureKind::from_tag)
                .collect();
        }
    }
    vec![TextureKind::Diffuse]
}

fn parse_draws_arg() -> u32 {
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--draws=") {
            match val.parse::<u32>() {
                Ok(n) => return n,
                Err(_) => log::warn!("Invalid --draws value '{}', using 1", val),
            }
        }
    }
    1
}

fn quad() -> (Vec<Vertex>, Vec<u32>) {
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-1.0, -1.0, 0.0], n, [0.0, 0.0]),
        Vertex::new([1.0, -1.0, 0.0], n, [1.0, 0.0]),
        Vertex::new([1.0, 1.0, 0.0], n, [1.0, 1.0]),
        Vertex::new([-1.0, 1.0, 0.0], n, [0.0, 1.0]),
    ]
    .into_iter()
    .map(|v| v.with_tangent_frame([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]))
    .collect();
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

fn log_call(call: &DeviceCall) {
    match call {
        DeviceCall::DrawIndexed { index_count, .. } => {
            log::info!("  draw {} indices", index_count)
        }
        other => log::info!("  {:?}", other),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let kinds = parse_textures_arg();
    let draws = parse_draws_arg();
    log::info!("Starting submesh demo. textures={:?}, draws={}", kinds, draws);

    let device = Rc::new(RecordingDevice::new());
    let program = device.create_program(PROGRAM_SAMPLERS);
    let textures = kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| {
            let path = format!("textures/{}_{}.png", kind, i);
            TextureRef::new(device.create_texture(), kind, path)
        })
        .collect();

    let (vertices, indices) = quad();
    let mesh = Mesh::new(device.clone(), vertices, indices, textures)
        .context("Failed to upload quad mesh")?;
    log::info!("Upload:");
    device.calls().iter().for_each(log_call);

    for frame in 0..draws {
        device.clear_calls();
        mesh.draw(&program);
        log::info!("Frame {}:", frame);
        device.calls().iter().for_each(log_call);
    }

    drop(mesh);
    log::info!("Live device objects after release: {}", device.live_objects());
    Ok(())
}
