use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{
    BufferedInterruptHandler, BufferedUart, Config as UartConfig, DataBits, Parity, StopBits,
};
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;

use crate::events::{EVENT_QUEUE_DEPTH, EventQueue, IntakeCounters, ingest};

const EVENT_UART_BAUD: u32 = 9_600;
const EVENT_UART_BUFFER_SIZE: usize = 4 * EVENT_QUEUE_DEPTH;

static mut UART_TX_BUFFER: [u8; EVENT_UART_BUFFER_SIZE] = [0; EVENT_UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; EVENT_UART_BUFFER_SIZE] = [0; EVENT_UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => BufferedInterruptHandler<hal::peripherals::USART5>;
});

/// Feeds flight-event bytes from the simulator link into the event queue.
#[embassy_executor::task]
pub async fn run(
    queue: &'static EventQueue,
    counters: &'static IntakeCounters,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = EVENT_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let mut uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize event UART")
    };

    let sender = queue.sender();
    let mut ingress = [0u8; EVENT_QUEUE_DEPTH];
    let mut reported_drops = 0;
    let mut reported_malformed = 0;

    loop {
        match uart.read(&mut ingress).await {
            Ok(count) if count > 0 => {
                ingest(&ingress[..count], &sender, counters);

                let dropped = counters.dropped();
                if dropped != reported_drops {
                    defmt::warn!("events: queue full, {} dropped so far", dropped);
                    reported_drops = dropped;
                }
                let malformed = counters.malformed();
                if malformed != reported_malformed {
                    defmt::warn!("events: {} malformed bytes so far", malformed);
                    reported_malformed = malformed;
                }
            }
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("events: UART read error");
                counters.raise_link_fault();
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}
