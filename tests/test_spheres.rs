// tests/test_spheres.rs — Sphere-shading payload: CPU reference behaviour.

use gridcast::image::BLACK;
use gridcast::spheres::{SceneParams, ShadingPolicy, Sphere, SphereScene};

fn single(c: i32, x: i32, y: i32, z: i32, radius: f32) -> SphereScene {
    SphereScene::new(5, 5, vec![Sphere { r: c, g: c, b: c, x, y, z, radius }])
}

#[test]
fn spheres_centre_hit_and_corner_miss() {
    let scene = single(100, 2, 2, 0, 1.0);
    for policy in [ShadingPolicy::Compatible, ShadingPolicy::NearestClamped] {
        let img = scene.render_cpu(policy);
        assert_eq!(img.pixel(2, 2), [100, 100, 100, 255], "{policy}");
        assert_eq!(img.pixel(0, 0), BLACK, "{policy}");
    }
}

#[test]
fn spheres_boundary_pixel_is_hit() {
    // Distance exactly 1 == radius: 100 − 3·1 − 0 = 97.
    let img = single(100, 2, 2, 0, 1.0).render_cpu(ShadingPolicy::Compatible);
    assert_eq!(img.pixel(3, 2), [97, 97, 97, 255]);
    assert_eq!(img.pixel(2, 1), [97, 97, 97, 255]);
    // Diagonal neighbour is √2 away: a miss.
    assert_eq!(img.pixel(3, 3), BLACK);
}

#[test]
fn spheres_negative_radius_leaves_background() {
    let scene = single(100, 2, 2, 0, -1.0);
    for policy in [ShadingPolicy::Compatible, ShadingPolicy::NearestClamped] {
        let img = scene.render_cpu(policy);
        assert!(img.pixels().all(|(_, _, p)| p == BLACK), "{policy}");
    }
}

#[test]
fn spheres_far_off_grid_centre_is_a_miss() {
    let scene = SphereScene::new(
        4,
        4,
        vec![
            Sphere { r: 100, g: 100, b: 100, x: 65_536, y: 0, z: 0, radius: 10.0 },
            Sphere { r: 100, g: 100, b: 100, x: -50_000, y: 70_000, z: 0, radius: 10.0 },
        ],
    );
    for policy in [ShadingPolicy::Compatible, ShadingPolicy::NearestClamped] {
        let img = scene.render_cpu(policy);
        assert!(img.pixels().all(|(_, _, p)| p == BLACK), "{policy}");
    }
}

#[test]
fn spheres_depth_darkens() {
    let img = single(100, 2, 2, 30, 1.0).render_cpu(ShadingPolicy::Compatible);
    assert_eq!(img.pixel(2, 2), [70, 70, 70, 255]);
}

#[test]
fn spheres_empty_scene_is_background() {
    let scene = SphereScene::new(7, 3, Vec::new());
    for policy in [ShadingPolicy::Compatible, ShadingPolicy::NearestClamped] {
        let img = scene.render_cpu(policy);
        assert!(img.pixels().all(|(_, _, p)| p == BLACK));
    }
}

#[test]
fn spheres_compatible_last_hit_wins() {
    // Both cover the centre; the later one in array order shows.
    let a = Sphere { r: 200, g: 10, b: 10, x: 2, y: 2, z: 0, radius: 2.0 };
    let b = Sphere { r: 10, g: 200, b: 10, x: 2, y: 2, z: 5, radius: 2.0 };
    let scene = SphereScene::new(5, 5, vec![a, b]);
    assert_eq!(scene.render_cpu(ShadingPolicy::Compatible).pixel(2, 2), [5, 195, 5, 255]);
    // Nearest-hit picks the smaller z regardless of order.
    assert_eq!(scene.render_cpu(ShadingPolicy::NearestClamped).pixel(2, 2), [200, 10, 10, 255]);
}

#[test]
fn spheres_compatible_leaves_saturated_channel_at_zero() {
    // Red would be 300 (> 255): never assigned, stays 0.
    let s = Sphere { r: 300, g: 100, b: 100, x: 0, y: 0, z: 0, radius: 1.0 };
    let scene = SphereScene::new(1, 1, vec![s]);
    assert_eq!(scene.render_cpu(ShadingPolicy::Compatible).pixel(0, 0), [0, 100, 100, 255]);
    assert_eq!(scene.render_cpu(ShadingPolicy::NearestClamped).pixel(0, 0), [255, 100, 100, 255]);
}

#[test]
fn spheres_generated_scene_renders_deterministically() {
    let p = SceneParams { width: 64, height: 64, count: 8, seed: 1234 };
    let a = SphereScene::generate(&p).render_cpu(ShadingPolicy::Compatible);
    let b = SphereScene::generate(&p).render_cpu(ShadingPolicy::Compatible);
    assert_eq!(a, b);
    assert!(a.pixels().all(|(_, _, px)| px[3] == 255));
}
