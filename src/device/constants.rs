use uuid::{uuid, Uuid};

/**
 * How long (milliseconds) the runtime may take to shut down after the session ends.
 * Pending console reads run on a blocking thread and are abandoned after this.
 */
pub const SHUTDOWN_DEADLINE: u64 = 500;

/**
 * Process exit status when a second Ctrl-C skips the teardown.
 */
pub const INTERRUPTED_TWICE_EXIT_CODE: i32 = 130;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) an interrupted connection attempt may take to finish before
 * it is abandoned. A finished attempt is disconnected right away.
 */
pub const CONNECT_SETTLE_DEADLINE: u64 = 10000;

/**
 * The UUID of the Bluetooth BLE service of the Braava robot.
 */
pub const BRAAVA_SERVICE: Uuid = uuid!("0bd51666-e7cb-469b-8e4d-2742f1ba77cc");

/**
 * The UUID of the Bluetooth BLE remote GATT characteristic to send commands to.
 */
pub const BRAAVA_COMMAND_CHARACTERISTIC: Uuid = uuid!("e7add780-b042-4876-aae1-112855353cc1");

/**
 * The UUID of the Bluetooth BLE remote GATT characteristic that pushes status frames.
 */
pub const BRAAVA_NOTIFY_CHARACTERISTIC: Uuid = uuid!("e7add780-b042-4876-aae1-112855353cc4");

/**
 * Advertised names (substrings) of supported robots.
 */
pub const PRODUCT_NAMES: [&str; 3] = ["iRobot Braava", "Braava Jet m6", "Altadena"];

// Every opcode is [MESSAGE_CLASS, SUB_CLASS, 0x00, action]
pub const MESSAGE_CLASS: u8 = 0x8b;
pub const SUB_CLASS: u8 = 0x02;

pub const ACTION_START: u8 = 0x00;
pub const ACTION_DOCK: u8 = 0x01;
pub const ACTION_STOP: u8 = 0x02;
pub const ACTION_STATUS: u8 = 0x03;
