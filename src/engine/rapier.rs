//! rapier3d-backed implementation of the engine capabilities.
//!
//! The arm is a reduced-coordinate multibody: one dynamic link body per
//! joint, chained onto a fixed base with revolute joints. Inverse kinematics
//! runs on the multibody; contacts come from the narrow phase; debug colors
//! and the debug camera are plain state a renderer can consume.

use std::collections::HashMap;

use na::{point, vector, DVector, Isometry3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::dynamics::{InverseKinematicsOption, JointAxesMask};
use rapier3d::prelude::*;
use tracing::{debug, info};

use crate::camera::CameraView;
use crate::engine::{
    BodyId, ContactPoint, EngineError, JointCommand, PhysicsEngine, Rgba,
};
use crate::types::Float;
use crate::{GRAVITY, PI, TWO_PI};

const BASE_HALF_WIDTH: Float = 0.08;
const BASE_HALF_HEIGHT: Float = 0.05;

/// Geometry and joint description for one arm link.
#[derive(Clone, Debug)]
pub struct ArmSegment {
    pub name: String,
    /// Rotation axis, expressed in the parent link frame.
    pub axis: UnitVector3<Float>,
    /// Extent of the link along the chain.
    pub length: Float,
    pub radius: Float,
    pub mass: Float,
}

struct ArmModel {
    base: RigidBodyHandle,
    base_collider: ColliderHandle,
    links: Vec<RigidBodyHandle>,
    link_colliders: Vec<ColliderHandle>,
    joints: Vec<MultibodyJointHandle>,
    joint_names: Vec<String>,
    axes: Vec<UnitVector3<Float>>,
    ft_sensor_joint: Option<usize>,
}

enum BodyRecord {
    /// Single rigid body: ground plane, table block, object.
    Simple {
        body: RigidBodyHandle,
        collider: ColliderHandle,
    },
    Arm(ArmModel),
}

pub struct RapierEngine {
    gravity: Vector3<Float>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    records: Vec<BodyRecord>,
    colors: HashMap<u32, Rgba>,
    camera: Option<CameraView>,
    connected: bool,
}

impl RapierEngine {
    /// Open a gravity-enabled world stepped at `dt` seconds.
    pub fn connect(dt: Float) -> Self {
        RapierEngine {
            gravity: vector![0.0, 0.0, -GRAVITY],
            integration_parameters: IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            records: vec![],
            colors: HashMap::new(),
            camera: None,
            connected: true,
        }
    }

    /// Infinite ground plane through the origin, normal +z.
    pub fn load_ground(&mut self) -> BodyId {
        let body = self.bodies.insert(RigidBodyBuilder::fixed().build());
        let collider = self.colliders.insert_with_parent(
            ColliderBuilder::new(SharedShape::new(HalfSpace::new(Vector3::z_axis()))).build(),
            body,
            &mut self.bodies,
        );
        self.push_record(BodyRecord::Simple { body, collider })
    }

    /// Fixed cube-shaped block, e.g. a table surface.
    pub fn load_table(&mut self, position: Vector3<Float>, half_extent: Float) -> BodyId {
        let body = self
            .bodies
            .insert(RigidBodyBuilder::fixed().translation(position).build());
        let collider = self.colliders.insert_with_parent(
            ColliderBuilder::cuboid(half_extent, half_extent, half_extent).build(),
            body,
            &mut self.bodies,
        );
        self.push_record(BodyRecord::Simple { body, collider })
    }

    /// Small movable cube.
    pub fn load_cube(
        &mut self,
        position: Vector3<Float>,
        half_extent: Float,
        mass: Float,
    ) -> BodyId {
        let body = self
            .bodies
            .insert(RigidBodyBuilder::dynamic().translation(position).build());
        let collider = self.colliders.insert_with_parent(
            ColliderBuilder::cuboid(half_extent, half_extent, half_extent)
                .mass(mass)
                .build(),
            body,
            &mut self.bodies,
        );
        self.push_record(BodyRecord::Simple { body, collider })
    }

    /// Articulated arm: capsule links chained upward from a fixed base with
    /// revolute joints. Contacts between directly jointed links are
    /// filtered; all other link pairs keep colliding.
    pub fn load_arm(
        &mut self,
        base_position: Vector3<Float>,
        segments: &[ArmSegment],
    ) -> Result<BodyId, EngineError> {
        let base = self.bodies.insert(
            RigidBodyBuilder::fixed()
                .translation(base_position + vector![0.0, 0.0, BASE_HALF_HEIGHT])
                .build(),
        );
        let base_collider = self.colliders.insert_with_parent(
            ColliderBuilder::cuboid(BASE_HALF_WIDTH, BASE_HALF_WIDTH, BASE_HALF_HEIGHT).build(),
            base,
            &mut self.bodies,
        );

        let mut links = Vec::with_capacity(segments.len());
        let mut link_colliders = Vec::with_capacity(segments.len());
        let mut joints = Vec::with_capacity(segments.len());
        let mut joint_names = Vec::with_capacity(segments.len());
        let mut axes = Vec::with_capacity(segments.len());

        let mut parent = base;
        let mut parent_anchor = point![0.0, 0.0, BASE_HALF_HEIGHT];
        let mut chain_z = base_position.z + 2.0 * BASE_HALF_HEIGHT;
        for segment in segments {
            let center = vector![
                base_position.x,
                base_position.y,
                chain_z + segment.length / 2.0
            ];
            let body = self
                .bodies
                .insert(RigidBodyBuilder::dynamic().translation(center).build());
            let half_height = (segment.length / 2.0 - segment.radius).max(0.01);
            let collider = self.colliders.insert_with_parent(
                ColliderBuilder::capsule_z(half_height, segment.radius)
                    .mass(segment.mass)
                    .build(),
                body,
                &mut self.bodies,
            );

            let joint = RevoluteJointBuilder::new(segment.axis)
                .local_anchor1(parent_anchor)
                .local_anchor2(point![0.0, 0.0, -segment.length / 2.0])
                .contacts_enabled(false);
            let handle = self
                .multibody_joints
                .insert(parent, body, joint, true)
                .ok_or_else(|| EngineError::InvalidChain(segment.name.clone()))?;

            links.push(body);
            link_colliders.push(collider);
            joints.push(handle);
            joint_names.push(segment.name.clone());
            axes.push(segment.axis);

            parent = body;
            parent_anchor = point![0.0, 0.0, segment.length / 2.0];
            chain_z += segment.length;
        }

        Ok(self.push_record(BodyRecord::Arm(ArmModel {
            base,
            base_collider,
            links,
            link_colliders,
            joints,
            joint_names,
            axes,
            ft_sensor_joint: None,
        })))
    }

    /// Mark one joint as carrying a force/torque sensor.
    pub fn enable_force_torque_sensor(
        &mut self,
        body: BodyId,
        joint: usize,
    ) -> Result<(), EngineError> {
        let arm = self.arm_mut(body)?;
        if joint >= arm.joints.len() {
            return Err(EngineError::UnknownJoint(body, joint));
        }
        arm.ft_sensor_joint = Some(joint);
        debug!(joint, "force/torque sensing enabled");
        Ok(())
    }

    /// Joint with force/torque sensing enabled, if any.
    pub fn force_torque_joint(&self, body: BodyId) -> Result<Option<usize>, EngineError> {
        Ok(self.arm(body)?.ft_sensor_joint)
    }

    /// Debug color last assigned to the body.
    pub fn body_color(&self, body: BodyId) -> Option<Rgba> {
        self.colors.get(&body.0).copied()
    }

    /// Debug viewport pose last assigned, for a renderer to consume.
    pub fn debug_camera(&self) -> Option<&CameraView> {
        self.camera.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn push_record(&mut self, record: BodyRecord) -> BodyId {
        self.records.push(record);
        BodyId((self.records.len() - 1) as u32)
    }

    fn record(&self, body: BodyId) -> Result<&BodyRecord, EngineError> {
        self.records
            .get(body.0 as usize)
            .ok_or(EngineError::UnknownBody(body))
    }

    fn arm(&self, body: BodyId) -> Result<&ArmModel, EngineError> {
        match self.record(body)? {
            BodyRecord::Arm(arm) => Ok(arm),
            BodyRecord::Simple { .. } => Err(EngineError::NotArticulated(body)),
        }
    }

    fn arm_mut(&mut self, body: BodyId) -> Result<&mut ArmModel, EngineError> {
        match self
            .records
            .get_mut(body.0 as usize)
            .ok_or(EngineError::UnknownBody(body))?
        {
            BodyRecord::Arm(arm) => Ok(arm),
            BodyRecord::Simple { .. } => Err(EngineError::NotArticulated(body)),
        }
    }

    fn base_body(&self, body: BodyId) -> Result<RigidBodyHandle, EngineError> {
        Ok(match self.record(body)? {
            BodyRecord::Simple { body, .. } => *body,
            BodyRecord::Arm(arm) => arm.base,
        })
    }

    fn colliders_of(&self, body: BodyId) -> Result<Vec<ColliderHandle>, EngineError> {
        Ok(match self.record(body)? {
            BodyRecord::Simple { collider, .. } => vec![*collider],
            BodyRecord::Arm(arm) => {
                let mut all = vec![arm.base_collider];
                all.extend_from_slice(&arm.link_colliders);
                all
            }
        })
    }
}

impl PhysicsEngine for RapierEngine {
    fn step_simulation(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn base_position(&self, body: BodyId) -> Result<Vector3<Float>, EngineError> {
        let handle = self.base_body(body)?;
        Ok(*self.bodies[handle].translation())
    }

    fn num_joints(&self, body: BodyId) -> Result<usize, EngineError> {
        Ok(match self.record(body)? {
            BodyRecord::Simple { .. } => 0,
            BodyRecord::Arm(arm) => arm.links.len(),
        })
    }

    fn joint_name(&self, body: BodyId, joint: usize) -> Result<String, EngineError> {
        self.arm(body)?
            .joint_names
            .get(joint)
            .cloned()
            .ok_or(EngineError::UnknownJoint(body, joint))
    }

    fn joint_angle(&self, body: BodyId, joint: usize) -> Result<Float, EngineError> {
        let arm = self.arm(body)?;
        let child = *arm
            .links
            .get(joint)
            .ok_or(EngineError::UnknownJoint(body, joint))?;
        let parent = if joint == 0 {
            arm.base
        } else {
            arm.links[joint - 1]
        };
        let relative = self.bodies[parent].rotation().inverse() * self.bodies[child].rotation();
        Ok(twist_angle(&relative, &arm.axes[joint]))
    }

    fn solve_ik(
        &mut self,
        body: BodyId,
        ee_joint: usize,
        target: &Vector3<Float>,
    ) -> Result<Vec<Float>, EngineError> {
        let (ee_handle, num_joints) = {
            let arm = self.arm(body)?;
            let handle = *arm
                .joints
                .get(ee_joint)
                .ok_or(EngineError::UnknownJoint(body, ee_joint))?;
            (handle, arm.joints.len())
        };

        let current: Vec<Float> = (0..num_joints)
            .map(|joint| self.joint_angle(body, joint))
            .collect::<Result<_, _>>()?;

        let (multibody, link_id) = self
            .multibody_joints
            .get(ee_handle)
            .ok_or(EngineError::UnknownJoint(body, ee_joint))?;

        // Position-only target; orientation of the end effector is free.
        let options = InverseKinematicsOption {
            constrained_axes: JointAxesMask::LIN_X | JointAxesMask::LIN_Y | JointAxesMask::LIN_Z,
            ..InverseKinematicsOption::default()
        };
        let target_pose = Isometry3::translation(target.x, target.y, target.z);
        let mut displacements = DVector::zeros(multibody.ndofs());
        multibody.inverse_kinematics(
            &self.bodies,
            link_id,
            &options,
            &target_pose,
            |_| true,
            &mut displacements,
        );

        if displacements.len() < num_joints {
            return Err(EngineError::ArityMismatch {
                solved: displacements.len(),
                joints: num_joints,
            });
        }
        // Any base degrees of freedom come first in the generalized
        // coordinates; the revolute dofs are the trailing ones, in chain
        // order. The solver returns displacements from the current
        // configuration.
        let offset = displacements.len() - num_joints;
        Ok(current
            .iter()
            .enumerate()
            .map(|(joint, angle)| angle + displacements[offset + joint])
            .collect())
    }

    fn command_joint(
        &mut self,
        body: BodyId,
        joint: usize,
        command: &JointCommand,
    ) -> Result<(), EngineError> {
        let handle = {
            let arm = self.arm(body)?;
            *arm.joints
                .get(joint)
                .ok_or(EngineError::UnknownJoint(body, joint))?
        };
        let (multibody, link_id) = self
            .multibody_joints
            .get_mut(handle)
            .ok_or(EngineError::UnknownJoint(body, joint))?;
        let link = multibody
            .link_mut(link_id)
            .ok_or(EngineError::UnknownJoint(body, joint))?;
        link.joint
            .data
            .set_motor(
                JointAxis::AngX,
                command.target_angle,
                command.target_velocity,
                command.position_gain,
                command.velocity_gain,
            )
            .set_motor_max_force(JointAxis::AngX, command.max_force);
        Ok(())
    }

    fn contact_points(
        &self,
        a: BodyId,
        b: BodyId,
    ) -> Result<Vec<ContactPoint>, EngineError> {
        let colliders_a = self.colliders_of(a)?;
        let colliders_b = self.colliders_of(b)?;

        let mut points = vec![];
        for &ca in &colliders_a {
            for &cb in &colliders_b {
                let Some(pair) = self.narrow_phase.contact_pair(ca, cb) else {
                    continue;
                };
                if !pair.has_any_active_contact {
                    continue;
                }
                for manifold in &pair.manifolds {
                    for contact in &manifold.points {
                        let (local, collider) = if pair.collider1 == ca {
                            (contact.local_p2, pair.collider2)
                        } else {
                            (contact.local_p1, pair.collider1)
                        };
                        let world = self.colliders[collider].position() * local;
                        points.push(ContactPoint {
                            location: world.coords,
                        });
                    }
                }
            }
        }
        Ok(points)
    }

    fn set_body_color(&mut self, body: BodyId, color: Rgba) -> Result<(), EngineError> {
        self.record(body)?;
        self.colors.insert(body.0, color);
        Ok(())
    }

    fn reset_debug_camera(&mut self, view: &CameraView) {
        self.camera = Some(*view);
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            info!("physics backend released");
        }
    }
}

impl Drop for RapierEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Rotation of `relative` about `axis`, wrapped into (-π, π].
fn twist_angle(relative: &UnitQuaternion<Float>, axis: &UnitVector3<Float>) -> Float {
    let q = relative.quaternion();
    let axis = axis.into_inner();
    let mut angle = 2.0 * q.vector().dot(&axis).atan2(q.w);
    if angle > PI {
        angle -= TWO_PI;
    } else if angle <= -PI {
        angle += TWO_PI;
    }
    angle
}
