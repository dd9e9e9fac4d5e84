use glam::{Quat, Vec3};
use phalanx::{AppConfig, Color, Transform, run};

fn main() {
    run(
        AppConfig::new().title("phalanx — layered glass").size(1280, 720),
        |ctx| {
            let sphere = ctx.sphere();
            let cube = ctx.cube();
            let pane = ctx.plane(2.5);

            *ctx.camera = ctx.camera.at(0.0, 1.2, 6.0).looking_at(0.0, 0.0, 0.0);

            move |frame| {
                let t = frame.time;

                // Slow orbit so layers cross each other and the sort
                // visibly takes over from submission order.
                let orbit = 0.3 * t;
                frame.camera.position = Vec3::new(6.0 * orbit.sin(), 1.2, 6.0 * orbit.cos());
                *frame.camera = frame.camera.looking_at(0.0, 0.0, 0.0);

                frame.draw(
                    sphere,
                    Transform::from_position(Vec3::new(0.0, 0.0, 0.0)).uniform_scale(2.2),
                    Color::rgb(0.9, 0.3, 0.2).with_alpha(0.45),
                );
                frame.draw(
                    cube,
                    Transform::new()
                        .position(Vec3::new(1.1, 0.0, -0.6))
                        .rotation(Quat::from_rotation_y(0.6 * t))
                        .uniform_scale(1.4),
                    Color::rgb(0.2, 0.8, 0.4).with_alpha(0.4),
                );
                frame.draw(
                    cube,
                    Transform::new()
                        .position(Vec3::new(-1.2, 0.3, 0.5))
                        .rotation(Quat::from_rotation_y(-0.4 * t)),
                    Color::rgb(0.3, 0.5, 0.95).with_alpha(0.4),
                );
                for i in 0..3 {
                    frame.draw(
                        pane,
                        Transform::new()
                            .position(Vec3::new(0.0, 0.0, -1.5 + 1.5 * i as f32))
                            .rotation(Quat::from_rotation_y(0.2 * t + i as f32)),
                        Color::rgb(0.9, 0.8, 0.3).with_alpha(0.3),
                    );
                }
            }
        },
    );
}
