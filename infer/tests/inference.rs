use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use infer::config::Config;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tch::{nn, Device};

fn test_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("infer-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_slice(path: &Path, width: u32, height: u32) -> Result<()> {
    std::fs::create_dir_all(path.parent().unwrap())?;
    RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90])).save(path)?;
    Ok(())
}

/// Saves randomly initialized weights of the configured model.
fn save_random_weights(config: &Config) -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let _model = config.model.kind.build(&vs.root())?;
    vs.save(&config.model.checkpoint)?;
    Ok(())
}

#[tokio::test]
async fn multi_class_inference_test() -> Result<()> {
    let dir = test_dir("multi-class")?;
    write_slice(&dir.join("Imgs/Patient1_3.jpg"), 40, 32)?;
    write_slice(&dir.join("Prior/Patient1_3.png"), 40, 32)?;

    let text = format!(
        r#"{{
            version: "0.1.0",
            model: {{
                kind: {{ type: "UNet", base_channels: 8 }},
                checkpoint: "{}",
                device: "cpu",
            }},
            input: {{ type: "MultiClass", image_dir: "{}", prior_dir: "{}" }},
            output: {{ dir: "{}" }},
        }}"#,
        dir.join("unet_model_1.ckpt").display(),
        dir.join("Imgs").display(),
        dir.join("Prior").display(),
        dir.join("out").display(),
    );
    let config = Config::from_json5(&text)?;
    save_random_weights(&config)?;

    infer::start(Arc::new(config)).await?;

    let output = image::open(dir.join("out/Patient1_3.png"))?;
    let output = output.as_rgb8().expect("expect an RGB prediction");
    assert_eq!(output.dimensions(), (40, 32));
    for pixel in output.pixels() {
        let [red, green, blue] = pixel.0;
        assert_eq!(blue, 0);
        assert!(matches!((red, green), (0, 0) | (255, 0) | (0, 255)));
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[tokio::test]
async fn single_class_inference_test() -> Result<()> {
    let dir = test_dir("single-class")?;
    write_slice(&dir.join("Imgs/slice_1.jpg"), 50, 40)?;
    std::fs::create_dir_all(dir.join("GT"))?;
    GrayImage::from_pixel(30, 20, Luma([255])).save(dir.join("GT/slice_1.png"))?;

    let text = format!(
        r#"{{
            version: "0.1.0",
            model: {{
                kind: {{ type: "InfNet", backbone: "ResNet50" }},
                checkpoint: "{}",
                device: "cpu",
            }},
            input: {{ type: "LungInf", image_dir: "{}", gt_dir: "{}", image_size: 64 }},
            output: {{ dir: "{}" }},
        }}"#,
        dir.join("Inf-Net-1.ckpt").display(),
        dir.join("Imgs").display(),
        dir.join("GT").display(),
        dir.join("out").display(),
    );
    let config = Config::from_json5(&text)?;
    save_random_weights(&config)?;

    infer::start(Arc::new(config)).await?;

    // predictions take the size of the ground truth mask
    let output = image::open(dir.join("out/slice_1.png"))?;
    let output = output.as_luma8().expect("expect a grayscale prediction");
    assert_eq!(output.dimensions(), (30, 20));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
