//! Render a few frames offscreen and write the last one to a PNG.
//! Run: cargo run -p debug --bin headless_frames -- [frames] [out.png]

use debug::DemoScene;
use glam::Vec3;
use prism_bridge::PrismPlugin;
use prism_renderer::{ProbeVolume, RendererConfig};
use render_api::{CameraMatrices, ExtractedView, RenderBackend};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = std::env::args().skip(1);
    let frames: u32 = args.next().map(|a| a.parse::<u32>().map_err(|e| format!("frame count: {e}"))).transpose()?.unwrap_or(12);
    let out = args.next().unwrap_or_else(|| "prism_frame.png".to_string());

    let (device, queue) = pollster::block_on(request_device())?;
    let config = RendererConfig {
        width: WIDTH,
        height: HEIGHT,
        probes: Some(ProbeVolume { center: Vec3::new(0.0, 0.5, 0.0), span: Vec3::new(4.0, 2.0, 4.0), density: Vec3::splat(0.5) }),
        probe_capture_resolution: 64,
        output_format: wgpu::TextureFormat::Rgba8Unorm,
        ..Default::default()
    };
    let mut plugin = PrismPlugin::new_with_config(device, queue, config)?;
    for light in DemoScene::lights() {
        plugin.add_light(light)?;
    }
    let scene = DemoScene::new();
    let view = ExtractedView {
        camera: CameraMatrices::look_at(Vec3::new(4.0, 3.0, 6.0), Vec3::ZERO, 45f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0),
        viewport_size: (WIDTH, HEIGHT),
    };
    for frame in 0..frames {
        plugin.prepare(&scene.extract(frame as f32 * 0.1));
        plugin.render_frame(&view)?;
    }
    log::info!("rendered {frames} frames, {} probes baked", plugin.renderer().probes().baked_probes());

    let rgba = read_back(&plugin)?;
    let image = image::RgbaImage::from_raw(WIDTH, HEIGHT, rgba).ok_or("readback size mismatch")?;
    image.save(&out).map_err(|e| e.to_string())?;
    println!("wrote {out}");
    Ok(())
}

/// Copy the offscreen target into a mappable buffer, dropping the row padding.
fn read_back(plugin: &PrismPlugin) -> Result<Vec<u8>, String> {
    let device = plugin.device();
    let unpadded = WIDTH * 4;
    let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("headless_readback"),
        size: (padded * HEIGHT) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("headless_readback") });
    encoder.copy_texture_to_buffer(
        plugin.offscreen_texture().as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(padded), rows_per_image: Some(HEIGHT) },
        },
        wgpu::Extent3d { width: WIDTH, height: HEIGHT, depth_or_array_layers: 1 },
    );
    plugin.queue().submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|e| e.to_string())?.map_err(|e| e.to_string())?;
    let data = slice.get_mapped_range();
    let mut rgba = Vec::with_capacity((unpadded * HEIGHT) as usize);
    for row in data.chunks(padded as usize) {
        rgba.extend_from_slice(&row[..unpadded as usize]);
    }
    drop(data);
    buffer.unmap();
    Ok(rgba)
}

async fn request_device() -> Result<(wgpu::Device, wgpu::Queue), String> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .ok_or("No adapter")?;
    log::info!("adapter: {:?}", adapter.get_info());
    adapter.request_device(&wgpu::DeviceDescriptor::default(), None).await.map_err(|e| e.to_string())
}
