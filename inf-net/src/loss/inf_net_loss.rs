use super::joint_loss::JointLoss;
use crate::{common::*, model::InfNetOutput};
use tch_modules::{BceWithLogitsLoss, BceWithLogitsLossInit};

pub use inf_net_loss_::*;
pub use inf_net_loss_output::*;

mod inf_net_loss_ {
    use super::*;

    /// Deep supervision over the four lateral maps plus the edge map.
    #[derive(Debug)]
    pub struct InfNetLoss {
        joint_loss: JointLoss,
        edge_loss: BceWithLogitsLoss,
    }

    impl Default for InfNetLoss {
        fn default() -> Self {
            Self::new(JointLoss::default())
        }
    }

    impl InfNetLoss {
        pub fn new(joint_loss: JointLoss) -> Self {
            Self {
                joint_loss,
                edge_loss: BceWithLogitsLossInit::default(Reduction::Mean).build(),
            }
        }

        pub fn forward(
            &self,
            output: &InfNetOutput,
            gts: &Tensor,
            edges: &Tensor,
        ) -> Result<InfNetLossOutput> {
            let edge_loss = self
                .edge_loss
                .forward(&output.lateral_edge, edges)
                .context("edge loss")?;
            let InfNetLossOutput {
                total_loss,
                loss_5,
                loss_4,
                loss_3,
                loss_2,
                ..
            } = self.evaluate(output, gts)?;

            Ok(InfNetLossOutput {
                total_loss: total_loss + &edge_loss,
                edge_loss: Some(edge_loss),
                loss_5,
                loss_4,
                loss_3,
                loss_2,
            })
        }

        /// Joint losses of the lateral maps without the edge term.
        pub fn evaluate(&self, output: &InfNetOutput, gts: &Tensor) -> Result<InfNetLossOutput> {
            let [loss_5, loss_4, loss_3, loss_2] = {
                let [map_5, map_4, map_3, map_2] = output.lateral_maps();
                [
                    self.joint_loss.forward(map_5, gts)?,
                    self.joint_loss.forward(map_4, gts)?,
                    self.joint_loss.forward(map_3, gts)?,
                    self.joint_loss.forward(map_2, gts)?,
                ]
            };
            let total_loss = Tensor::f_sum_tensors([&loss_5, &loss_4, &loss_3, &loss_2])?;

            Ok(InfNetLossOutput {
                total_loss,
                edge_loss: None,
                loss_5,
                loss_4,
                loss_3,
                loss_2,
            })
        }
    }
}

mod inf_net_loss_output {
    use super::*;

    #[derive(Debug, TensorLike)]
    pub struct InfNetLossOutput {
        /// The optimized loss, including the edge term when present.
        pub total_loss: Tensor,
        pub edge_loss: Option<Tensor>,
        pub loss_5: Tensor,
        pub loss_4: Tensor,
        pub loss_3: Tensor,
        pub loss_2: Tensor,
    }

    impl InfNetLossOutput {
        /// Sum of the four lateral map losses.
        pub fn segmentation_loss(&self) -> Tensor {
            &self.loss_2 + &self.loss_3 + &self.loss_4 + &self.loss_5
        }
    }
}
