use farmx_targeting::*;

fn main() {
    let frame = FrameSize::new(640, 480);
    let detections = [
        BoundingBox::new(320.0, 240.0, 50.0, 60.0),
        BoundingBox::from_corners(10.0, 10.0, 40.0, 30.0),
        BoundingBox::new(639.0, 479.0, 12.0, 12.0),
    ];
    let wind = WindVector::new(3.0, 90.0); // 3 m/s from the East

    let grid = GridMapper::default();
    let compensator = WindCompensator::default();
    let servo = ServoAngleMapper::default();

    println!("Frame {} -> {}x{} grid, wind {}", frame, grid.grid_size(), grid.grid_size(), wind);
    println!("Servo limits: {}", servo.limits());

    for (i, bbox) in detections.iter().enumerate() {
        let cell = match grid.map_to_grid(bbox, frame) {
            Ok(cell) => cell,
            Err(e) => {
                eprintln!("Detection {} rejected: {}", i, e);
                continue;
            }
        };
        match compensator.compensate(cell, &wind) {
            Ok(target) => {
                println!(
                    "Detection {}: {} -> cell {} -> target {} -> {}",
                    i,
                    bbox,
                    cell,
                    target,
                    servo.to_servo_angles(target)
                );
            }
            Err(e) => eprintln!("Detection {}: compensation failed: {}", i, e),
        }
    }
}
