use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt::Display2Format;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::channel::Channel;
use embassy_time::Delay;
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use payload_core::sequencer::{MissionProfile, MissionSequencer};
use payload_core::sequences::ActuatorId;
use static_cell::StaticCell;

use crate::events::{EventQueue, IntakeCounters, QueuedEventSource};
use crate::hw::ms8607::Ms8607;
use crate::hw::vl6180x::Vl6180x;
use crate::hw::{AdcSyringe, BoardActuators, PayloadSensors, idle_level};
use crate::storage::{DummyTime, LOG_FILE_NAME, SdRecordSink};

use self::mission_task::{EmbassyClock, EmbassyHold};

mod event_task;
mod mission_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

const I2C_FREQUENCY: Hertz = Hertz(100_000);
/// SD cards must be initialised at or below 400 kHz.
const SD_SPI_FREQUENCY: Hertz = Hertz(400_000);

type I2cBus = I2c<'static, Blocking>;
type SharedI2c = RefCellDevice<'static, I2cBus>;
type SdDevice = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;

type FirmwareSensors = PayloadSensors<SharedI2c, SharedI2c, AdcSyringe<'static>, Delay>;

pub(super) type FirmwareSequencer = MissionSequencer<
    QueuedEventSource<'static, EmbassyClock>,
    FirmwareSensors,
    BoardActuators<'static>,
    EmbassyHold,
    SdRecordSink<SdDevice, DummyTime>,
>;

pub(super) static EVENT_QUEUE: EventQueue = Channel::new();
pub(super) static INTAKE: IntakeCounters = IntakeCounters::new();
static I2C_BUS: StaticCell<RefCell<I2cBus>> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PA9,
        PA10,
        PB0,
        PB1,
        PB3,
        PB4,
        PB6,
        PB7,
        ADC1,
        I2C1,
        SPI1,
        USART5,
        ..
    } = hal::init(config);

    // Outputs first, at their idle levels, before anything else can stall boot.
    let actuators = BoardActuators::new(
        Output::new(PB3, idle_level(ActuatorId::Solenoid), Speed::Low),
        Output::new(PB4, idle_level(ActuatorId::Motor), Speed::Low),
        Output::new(PA8, idle_level(ActuatorId::LedPrimary), Speed::Low),
        Output::new(PA9, idle_level(ActuatorId::LedSecondary), Speed::Low),
        Output::new(PA10, idle_level(ActuatorId::CameraTrigger), Speed::Low),
    );

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = I2C_FREQUENCY;
    let i2c_bus = I2C_BUS.init(RefCell::new(I2c::new_blocking(I2C1, PB6, PB7, i2c_config)));

    let mut sensors = PayloadSensors::new(
        Vl6180x::new(RefCellDevice::new(i2c_bus), Delay),
        Ms8607::new(RefCellDevice::new(i2c_bus), Delay),
        AdcSyringe::new(Adc::new(ADC1), PA1.degrade_adc()),
    );
    let (range, pressure) = sensors.init();
    if let Err(error) = range {
        defmt::warn!("hw: VL6180X unavailable ({})", Display2Format(&error));
    }
    if let Err(error) = pressure {
        defmt::warn!("hw: MS8607 unavailable ({})", Display2Format(&error));
    }

    let mut spi_config = spi::Config::default();
    spi_config.frequency = SD_SPI_FREQUENCY;
    let spi = Spi::new_blocking(SPI1, PA5, PA7, PA6, spi_config);
    let chip_select = Output::new(PA4, Level::High, Speed::VeryHigh);
    let card = ExclusiveDevice::new_no_delay(spi, chip_select).expect("SD chip select");
    let mut sink = SdRecordSink::new(card, DummyTime);
    if let Err(error) = sink.mount() {
        defmt::warn!(
            "storage: {} not mounted ({}), records will queue",
            LOG_FILE_NAME,
            Display2Format(&error)
        );
    }

    let events = QueuedEventSource::new(EVENT_QUEUE.receiver(), &INTAKE, EmbassyClock::start());
    let mission = MissionSequencer::new(
        MissionProfile::FLIGHT,
        events,
        sensors,
        actuators,
        EmbassyHold,
        sink,
    )
    .expect("flight profile is valid");

    spawner
        .spawn(event_task::run(&EVENT_QUEUE, &INTAKE, USART5, PB0, PB1))
        .expect("failed to spawn event intake task");

    spawner
        .spawn(mission_task::run(mission))
        .expect("failed to spawn mission task");

    core::future::pending::<()>().await;
}
