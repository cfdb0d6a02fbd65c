use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use nalgebra::{UnitQuaternion, Vector3, Vector4};

use rust_slam_bridge::config::BridgeConfig;
use rust_slam_bridge::geometry::{FrameRole, SE3};
use rust_slam_bridge::publish::{
    OdometryRecord, Outputs, PointCloudRecord, PoseRecord, Topic, TransformStamped,
};
use rust_slam_bridge::system::{EstimationObserver, Frame, PublishBridge, Submap, SubmapId};
use rust_slam_bridge::viz::rerun::RerunVisualizer;

const FRAME_RATE_HZ: f64 = 100.0;
const NUM_FRAMES: usize = 1000;
const FRAMES_PER_SUBMAP: usize = 50;
const CIRCLE_RADIUS: f64 = 10.0;
const ANGULAR_SPEED: f64 = 0.3;
/// Odometry drift along odom X, in metres per second.
const DRIFT_PER_SEC: f64 = 0.05;

/// Ground-truth body pose on a circle, facing along the tangent.
fn true_pose(t: f64) -> SE3 {
    let angle = ANGULAR_SPEED * t;
    SE3 {
        rotation: UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            angle + std::f64::consts::FRAC_PI_2,
        ),
        translation: Vector3::new(CIRCLE_RADIUS * angle.cos(), CIRCLE_RADIUS * angle.sin(), 0.0),
    }
}

fn drifting_odometry(t: f64) -> SE3 {
    SE3::from_translation(Vector3::new(DRIFT_PER_SEC * t, 0.0, 0.0)).compose(&true_pose(t))
}

/// Ring of points around the sensor, in the sensor frame.
fn scan_ring(n: usize, radius: f64) -> Vec<Vector4<f64>> {
    (0..n)
        .map(|i| {
            let a = i as f64 / n as f64 * std::f64::consts::TAU;
            Vector4::new(radius * a.cos(), radius * a.sin(), 0.0, 1.0)
        })
        .collect()
}

fn main() -> Result<()> {
    let use_rerun = std::env::args().any(|arg| arg == "--rerun");
    let config = BridgeConfig::default();

    // In-process topics, used when no viewer is requested
    let map_topic = Topic::<PointCloudRecord>::new("map", config.map_queue_depth);
    let points_topic = Topic::<PointCloudRecord>::new("points", config.points_queue_depth);
    let odom_topic = Topic::<OdometryRecord>::new("odom", config.odom_queue_depth);
    let pose_topic = Topic::<PoseRecord>::new("pose", config.pose_queue_depth);
    let tf_topic = Topic::<TransformStamped>::new("tf", 64);

    let mut consumers = Vec::new();
    let (outputs, _viz) = if use_rerun {
        let viz = RerunVisualizer::spawn("rust-slam-bridge", &config.frames)?;
        (viz.outputs(), Some(viz))
    } else {
        let map_sub = map_topic.subscribe();
        consumers.push(thread::spawn(move || {
            map_sub
                .iter()
                .inspect(|m| println!("merged map: {} points at t={:.3}", m.points.len(), m.stamp))
                .count()
        }));
        let pose_sub = pose_topic.subscribe();
        consumers.push(thread::spawn(move || pose_sub.iter().count()));
        let tf_sub = tf_topic.subscribe();
        consumers.push(thread::spawn(move || tf_sub.iter().count()));
        let points_sub = points_topic.subscribe();
        consumers.push(thread::spawn(move || points_sub.iter().count()));
        let odom_sub = odom_topic.subscribe();
        consumers.push(thread::spawn(move || odom_sub.iter().count()));

        let outputs = Outputs {
            transforms: tf_topic.clone(),
            points: points_topic.clone(),
            odometry: odom_topic.clone(),
            pose: pose_topic.clone(),
            map: map_topic.clone(),
        };
        (outputs, None)
    };

    let bridge = Arc::new(PublishBridge::new(config.clone(), outputs)?);
    let observer: Arc<dyn EstimationObserver> = bridge.clone();

    let dt = 1.0 / FRAME_RATE_HZ;
    let points: Arc<[Vector4<f64>]> = scan_ring(64, 5.0).into();
    let t_body_sensor = SE3::from_translation(Vector3::new(0.0, 0.0, 0.3));
    let mut submaps: Vec<Arc<Submap>> = Vec::new();

    for i in 0..NUM_FRAMES {
        let t = i as f64 * dt;
        let t_odom_body = drifting_odometry(t);
        let v_odom_body = (drifting_odometry(t + dt).translation - t_odom_body.translation) / dt;

        observer.on_new_pose_frame(&Frame {
            role: FrameRole::Sensor,
            timestamp: t,
            t_odom_body,
            t_body_sensor,
            v_odom_body,
            points: points.clone(),
        });

        if (i + 1) % FRAMES_PER_SUBMAP == 0 {
            let start = t - (FRAMES_PER_SUBMAP - 1) as f64 * dt;
            let t_world_origin = true_pose(start);
            let t_origin_endpoint = t_world_origin.inverse().compose(&true_pose(t));
            let origin_points: Vec<Vector4<f64>> = points
                .iter()
                .map(|p| t_body_sensor.transform_homogeneous(p))
                .collect();

            submaps.push(Arc::new(Submap {
                id: SubmapId(submaps.len() as u64),
                t_world_origin,
                t_origin_endpoint,
                last_stamp: t,
                points: origin_points.into(),
            }));
            // The backend reports every submap it knows about
            observer.on_submap_batch_update(&submaps);
        }

        if i % 100 == 0 {
            let world = bridge.alignment().lock().current_world_pose();
            if let Some(world) = world {
                let error = (world.translation - true_pose(t).translation).norm();
                println!(
                    "Frame {}/{} (t={:.2}s): world error {:.3} m, {} submaps retained, {} publish cycles",
                    i,
                    NUM_FRAMES,
                    t,
                    error,
                    bridge.retained_submaps(),
                    bridge.publish_cycles()
                );
            }
        }

        thread::sleep(Duration::from_secs_f64(dt / 4.0));
    }

    // Let the scheduler drain the last batch
    thread::sleep(config.publish_period * 3);

    drop(observer);
    // Consumers only finish once the bridge releases its topic handles
    let Ok(mut bridge) = Arc::try_unwrap(bridge) else {
        bail!("bridge still shared at exit; consumer threads would never finish");
    };
    bridge.shutdown();
    drop(bridge);
    drop(map_topic);
    drop(pose_topic);
    drop(tf_topic);
    drop(points_topic);
    drop(odom_topic);

    let counts: Vec<usize> = consumers
        .into_iter()
        .map(|handle| handle.join().unwrap_or(0))
        .collect();
    if !counts.is_empty() {
        println!(
            "Done! {} merged maps, {} world poses, {} transforms, {} scans, {} odometry records received",
            counts[0], counts[1], counts[2], counts[3], counts[4]
        );
    }

    Ok(())
}
