//! Cadence - demo firmware
//!
//! Runs the cooperative scheduler on an RP2040 with a typical input set:
//!
//! - Status LED blinking from a periodic unit (GPIO25)
//! - Push button, active low (GPIO2). Holding it starts ladder calibration
//! - Four-button resistor ladder on ADC0 (GPIO26)
//! - Rotary encoder (GPIO14/GPIO15), decoded from an edge-waiting task
//! - Analog joystick on ADC1/ADC2 (GPIO27/GPIO28)
//!
//! Everything except the encoder edge task runs from the tick loop, which
//! yields to the executor between ticks.

#![no_std]
#![no_main]

use core::cell::{Cell, RefCell};

use defmt::*;
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_futures::yield_now;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use {defmt_rtt as _, panic_probe as _};

use cadence_core::{
    Button, ButtonConfig, ButtonGroup, ButtonGroupConfig, Direction, Encoder, EncoderConfig,
    Joystick, JoystickConfig, Millis, QuadratureDecoder, QuadraturePosition, Scheduler, SoloButton,
    SoloButtonConfig, SubmitError, Unit,
};
use cadence_hal::{Clock, EhInput};
use cadence_hal_rp2040::{EmbassyClock, RpAnalogInput};

/// Upper bound on concurrently scheduled units
const MAX_UNITS: usize = 8;

const LADDER_BUTTONS: usize = 4;

/// Nominal 12-bit readings of the ladder buttons before calibration
const LADDER_LEVELS: [u16; LADDER_BUTTONS] = [0, 1024, 2048, 3072];

const BLINK_MS: Millis = 500;
const REPORT_MS: Millis = 5000;

/// Raw joystick movement per sample worth logging
const JOYSTICK_LOG_DELTA: i32 = 64;

const BUTTON: SoloButtonConfig = SoloButtonConfig {
    button: ButtonConfig {
        hold_threshold_ms: 1000,
        hold_repeat_ms: 250,
    },
    poll_rate_ms: 10,
    active_low: true,
};

const LADDER: ButtonGroupConfig = ButtonGroupConfig {
    poll_rate_ms: 10,
    resolution: 12,
    epsilon: 30,
    sample_quota: 200,
};

const ENCODER: EncoderConfig = EncoderConfig {
    poll_rate_ms: 30,
    reversed: false,
};

const JOYSTICK: JoystickConfig = JoystickConfig {
    poll_rate_ms: 30,
    resolution: 12,
    reverse_x: false,
    reverse_y: true,
    average_ratio: 0.8,
};

/// Raw encoder transitions, written by the edge task
static ENCODER_POSITION: QuadraturePosition = QuadraturePosition::new();

type Units<'a> = Scheduler<'a, EmbassyClock, MAX_UNITS>;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Cadence firmware starting...");

    let p = embassy_rp::init(Default::default());

    let enc_a = Input::new(p.PIN_14, Pull::Up);
    let enc_b = Input::new(p.PIN_15, Pull::Up);
    spawner.spawn(encoder_edge_task(enc_a, enc_b)).unwrap();

    let mut led = Output::new(p.PIN_25, Level::Low);
    let adc = RefCell::new(Adc::new_blocking(p.ADC, AdcConfig::default()));
    let ladder_input = RpAnalogInput::new(&adc, Channel::new_pin(p.PIN_26, Pull::None));
    let stick_x = RpAnalogInput::new(&adc, Channel::new_pin(p.PIN_27, Pull::None));
    let stick_y = RpAnalogInput::new(&adc, Channel::new_pin(p.PIN_28, Pull::None));

    info!("Peripherals initialized");

    // Shared between callbacks and the units that act on them
    let calibrate = Cell::new(false);

    let mut blink = |_now: Millis| led.toggle();

    let mut on_click = || info!("button clicked");
    let mut on_hold = |first: bool| {
        if first {
            calibrate.set(true);
        }
    };
    let mut button = SoloButton::new(EhInput::new(Input::new(p.PIN_2, Pull::Up)), BUTTON);
    button.button_mut().set_on_pressed(&mut on_click);
    button.button_mut().set_on_hold(&mut on_hold);

    let mut ladder_clicks: [_; LADDER_BUTTONS] =
        core::array::from_fn(|index| move || info!("ladder button {} clicked", index));
    let mut ladder: ButtonGroup<'_, _, LADDER_BUTTONS> = ButtonGroup::new(ladder_input, LADDER);
    for (on_ladder_click, &level) in ladder_clicks.iter_mut().zip(LADDER_LEVELS.iter()) {
        let mut member = Button::default();
        member.set_on_pressed(on_ladder_click);
        ladder.add_button(member, level);
    }
    let mut ladder_work = |now: Millis| {
        if calibrate.take() && !ladder.is_calibrating() {
            ladder.start_calibration();
        }
        ladder.poll(now);
    };

    let mut on_rotate = |direction: Direction, detents: u32| {
        info!("encoder {} x{}", direction, detents);
    };
    let mut encoder = Encoder::new(&ENCODER_POSITION, ENCODER);
    encoder.set_on_rotate(&mut on_rotate);

    let mut stick = Joystick::new(stick_x, stick_y, JOYSTICK);
    let mut stick_work = |_now: Millis| {
        stick.sample();
        let (dx, dy) = stick.raw_diffs();
        if dx.abs() >= JOYSTICK_LOG_DELTA || dy.abs() >= JOYSTICK_LOG_DELTA {
            let (x, y) = stick.values();
            info!("joystick x={} y={}", x, y);
        }
    };

    let mut scheduler: Units<'_> = Scheduler::new(EmbassyClock::new());
    submit(&mut scheduler, "blink", Unit::periodic(&mut blink, BLINK_MS));
    submit(&mut scheduler, "button", button.as_schedulable_unit());
    submit(
        &mut scheduler,
        "ladder",
        Unit::periodic(&mut ladder_work, LADDER.poll_rate_ms),
    );
    submit(&mut scheduler, "encoder", encoder.as_schedulable_unit());
    submit(
        &mut scheduler,
        "joystick",
        Unit::periodic(&mut stick_work, JOYSTICK.poll_rate_ms),
    );

    info!("{} units scheduled, entering tick loop", scheduler.task_count());

    let mut next_report = REPORT_MS;
    loop {
        scheduler.tick_now();

        let now = scheduler.clock().now_ms();
        if now >= next_report {
            info!(
                "load {}% over {} units",
                scheduler.load(),
                scheduler.task_count()
            );
            scheduler.log_units();
            next_report = now + REPORT_MS;
        }

        yield_now().await;
    }
}

fn submit<'a>(scheduler: &mut Units<'a>, name: &str, unit: Unit<'a>) {
    match scheduler.submit(unit) {
        Ok(id) => debug!("{} scheduled as unit {}", name, id.index()),
        Err(SubmitError::Full(_)) => error!("no unit slot left for {}", name),
        Err(SubmitError::Halted(_)) => warn!("{} was halted, not scheduled", name),
    }
}

/// Feed encoder edges to the decoder as they happen
#[embassy_executor::task]
async fn encoder_edge_task(mut a: Input<'static>, mut b: Input<'static>) {
    let mut decoder = QuadratureDecoder::new(&ENCODER_POSITION, a.is_high(), b.is_high());
    loop {
        select(a.wait_for_any_edge(), b.wait_for_any_edge()).await;
        decoder.on_edge(a.is_high(), b.is_high());
    }
}
