use anyhow::Result;
use inf_net::{
    loss::InfNetLoss,
    model::{BackboneKind, InfNetInit, ModelConfig, Model, UNetInit},
};
use tch::{nn, Device, Kind, Tensor};

fn check_inf_net(backbone: BackboneKind, n_classes: usize) -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = InfNetInit {
        backbone,
        n_classes,
        ..Default::default()
    }
    .build(&vs.root())?;
    assert_eq!(model.backbone_kind(), backbone);

    let input = Tensor::randn(&[2, 3, 64, 64], (Kind::Float, Device::Cpu));
    let output = model.forward_t(&input, false)?;
    let n_classes = n_classes as i64;
    for map in output.lateral_maps() {
        assert_eq!(map.size(), vec![2, n_classes, 64, 64]);
    }
    assert_eq!(output.lateral_edge.size(), vec![2, 1, 64, 64]);

    let probability = output.probability_map(50, 40)?;
    assert_eq!(probability.size(), vec![2, n_classes, 50, 40]);
    assert!(f64::from(&probability.min()) >= 0.0);
    assert!(f64::from(&probability.max()) <= 1.0);
    Ok(())
}

#[test]
fn inf_net_res2net_test() -> Result<()> {
    check_inf_net(BackboneKind::Res2Net50, 1)
}

#[test]
fn inf_net_resnet_test() -> Result<()> {
    check_inf_net(BackboneKind::ResNet50, 1)
}

#[test]
fn inf_net_vgg_test() -> Result<()> {
    check_inf_net(BackboneKind::VggNet16, 1)
}

#[test]
fn inf_net_multi_class_test() -> Result<()> {
    check_inf_net(BackboneKind::ResNet50, 3)
}

#[test]
fn inf_net_rejects_tiny_input_test() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = InfNetInit::default().build(&vs.root())?;
    let input = Tensor::randn(&[1, 3, 16, 16], (Kind::Float, Device::Cpu));
    assert!(model.forward_t(&input, false).is_err());
    let input = Tensor::randn(&[1, 1, 64, 64], (Kind::Float, Device::Cpu));
    assert!(model.forward_t(&input, false).is_err());
    Ok(())
}

#[test]
fn inf_net_training_step_test() -> Result<()> {
    use nn::OptimizerConfig as _;

    let vs = nn::VarStore::new(Device::Cpu);
    let model = InfNetInit {
        backbone: BackboneKind::ResNet50,
        ..Default::default()
    }
    .build(&vs.root())?;
    let mut optimizer = nn::Adam::default().build(&vs, 1e-4)?;
    let loss_fn = InfNetLoss::default();

    let images = Tensor::randn(&[2, 3, 64, 64], (Kind::Float, Device::Cpu));
    let gts = Tensor::rand(&[2, 1, 64, 64], (Kind::Float, Device::Cpu)).round();
    let edges = Tensor::zeros(&[2, 1, 64, 64], (Kind::Float, Device::Cpu));

    let output = model.forward_t(&images, true)?;
    let losses = loss_fn.forward(&output, &gts, &edges)?;
    let total = f64::from(&losses.total_loss);
    assert!(total.is_finite() && total > 0.0);
    assert!(losses.edge_loss.is_some());

    optimizer.zero_grad();
    losses.total_loss.backward();
    optimizer.clip_grad_value(0.5);
    optimizer.step();

    let evaluated = loss_fn.evaluate(&model.forward_t(&images, false)?, &gts)?;
    assert!(evaluated.edge_loss.is_none());
    Ok(())
}

#[test]
fn unet_test() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = UNetInit {
        base_channels: 8,
        ..Default::default()
    }
    .build(&vs.root())?;
    let input = Tensor::randn(&[2, 6, 48, 40], (Kind::Float, Device::Cpu));
    let output = model.forward_t(&input, false)?;
    assert_eq!(output.size(), vec![2, 3, 48, 40]);

    let wrong = Tensor::randn(&[2, 3, 48, 40], (Kind::Float, Device::Cpu));
    assert!(model.forward_t(&wrong, false).is_err());
    Ok(())
}

#[test]
fn model_config_build_test() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = ModelConfig::UNet {
        input_channels: 6,
        n_classes: 3,
        base_channels: 8,
    };
    match config.build(&vs.root() / "unet")? {
        Model::UNet(model) => assert_eq!(model.n_classes(), 3),
        Model::InfNet(_) => panic!("expect a UNet model"),
    }
    Ok(())
}
