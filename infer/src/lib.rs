mod common;
pub mod config;
pub mod input_stream;
pub mod output;

use crate::{
    common::*,
    config::Config,
    input_stream::{InputRecord, InputStream},
    output::{multi_class_image, output_file_name, single_class_image, OutputImage},
};
use inf_net::checkpoint as inf_checkpoint;

pub async fn start(config: Arc<Config>) -> Result<()> {
    let output_dir = config.output.dir.clone();
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("unable to create '{}'", output_dir.display()))?;

    let (output_tx, output_rx) = async_channel::bounded(num_cpus::get() * 2);

    // run the model on a blocking thread
    let inference_fut = {
        let config = config.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let device = config.model.device;
            let mut vs = nn::VarStore::new(device);
            let model = config.model.kind.build(&vs.root())?;
            inf_checkpoint::load_partial(&mut vs, &config.model.checkpoint)?;
            info!(
                "loaded '{}' with {} parameters",
                config.model.checkpoint.display(),
                inf_checkpoint::parameter_count(&vs)
            );

            let input_stream = InputStream::new(config.clone())?;

            for record in input_stream.records() {
                let record = record?.to_device(device);
                let name = record.name.clone();
                let image = tch::no_grad(|| predict(&model, &record))?;

                info!("predicted '{}'", name);
                let sent =
                    futures::executor::block_on(output_tx.send((output_file_name(&name), image)));
                if sent.is_err() {
                    bail!("the output writer stopped unexpectedly");
                }
            }

            Ok(())
        })
        .map(|result| Fallible::Ok(result??))
    };

    // write predictions
    let output_fut = async move {
        while let Ok((file_name, image)) = output_rx.recv().await {
            let path = output_dir.join(file_name);
            tokio::task::spawn_blocking(move || image.save(path)).await??;
        }
        Fallible::Ok(())
    };

    futures::try_join!(inference_fut, output_fut)?;

    Ok(())
}

fn predict(model: &Model, record: &InputRecord) -> Result<OutputImage> {
    let InputRecord {
        input,
        output_size: (height, width),
        ..
    } = record;

    let image = match model {
        Model::InfNet(model) => {
            let probability = model
                .forward_t(input, false)?
                .probability_map(*height, *width)?;
            OutputImage::Gray(single_class_image(&probability.i(0).to_device(Device::Cpu))?)
        }
        Model::UNet(model) => {
            let scores = model
                .forward_t(input, false)?
                .sigmoid()
                .resize2d_bilinear(*height, *width, false)?;
            OutputImage::Rgb(multi_class_image(&scores.i(0).to_device(Device::Cpu))?)
        }
    };

    Ok(image)
}
